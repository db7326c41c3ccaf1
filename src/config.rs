//! Shark-fin pricing configuration
//!
//! Two layers:
//!
//! - [`SharkfinRequest`] mirrors the serialized request field-for-field. Every field
//!   is optional on the wire and defaults to zero / false / empty.
//! - [`SharkfinConfig`] is the validated, fully-resolved record the engine runs on.
//!   Fallbacks (`rand_rows`, `runs_step_n`, `year_days_n`, ...) are resolved exactly
//!   once, here, and boolean switches are folded into small tagged variants so the
//!   pipeline never re-derives them mid-computation.
//!
//! All ratios (barriers, strikes, rates) are decimal fractions, not percentages.

use crate::error::{validation::*, SharkfinError, SharkfinResult};
use serde::{Deserialize, Deserializer, Serialize};

/// Accepts `true`/`false` as well as the `0`/`1` integers older clients send.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlagRepr {
        Bool(bool),
        Int(i64),
    }

    Ok(match FlagRepr::deserialize(deserializer)? {
        FlagRepr::Bool(b) => b,
        FlagRepr::Int(i) => i != 0,
    })
}

/// Serialized pricing request, field names as on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharkfinRequest {
    pub rand_rows: usize,
    pub rand_cols: usize,
    #[serde(deserialize_with = "flag")]
    pub rand_quasi: bool,
    pub rand_seed: Vec<u64>,

    #[serde(deserialize_with = "flag")]
    pub dual_smooth: bool,
    pub runs_size: usize,
    pub runs_step: usize,
    pub year_days: usize,
    pub sigma: f64,
    pub basis_rate: f64,
    pub risk_free_rate: f64,
    pub price_limit_ratio: f64,
    pub price_limit_style: u8,

    pub notional: f64,
    #[serde(deserialize_with = "flag")]
    pub trade_long: bool,
    pub option_type: u8,
    pub barrier_type: u8,
    #[serde(deserialize_with = "flag")]
    pub reverse_knock_out: bool,
    #[serde(deserialize_with = "flag")]
    pub strike_payoff_abs: bool,
    pub start_price: f64,
    pub h_l: f64,
    pub h_h: f64,
    pub k_l: f64,
    pub k_h: f64,
    pub x_l: f64,
    pub x_h: f64,
    pub p_l: f64,
    pub p_h: f64,

    pub option_fee: f64,
    pub option_fee_interest: f64,
    #[serde(deserialize_with = "flag")]
    pub back_end_load: bool,
    #[serde(deserialize_with = "flag")]
    pub is_kop_delay: bool,
    #[serde(deserialize_with = "flag")]
    pub knock_o_occur: bool,
    pub knock_o_point: f64,
    #[serde(deserialize_with = "flag")]
    pub is_futures: bool,
    /// FX underlying. Carry is the same as for any spot underlying, with
    /// `basis_rate` read as the foreign rate, so the flag changes nothing.
    #[serde(deserialize_with = "flag")]
    pub is_foreign: bool,
    pub margin_rate: f64,
    pub margin_interest: f64,
    #[serde(deserialize_with = "flag")]
    pub discount_payoff: bool,
    #[serde(deserialize_with = "flag")]
    pub discount_margin: bool,
    #[serde(deserialize_with = "flag")]
    pub discount_option_fee: bool,
    #[serde(deserialize_with = "flag")]
    pub compound_option_fee: bool,
    pub extend_end_days: usize,
    #[serde(deserialize_with = "flag")]
    pub market_close: bool,

    pub consumed_option_fee_rate: f64,
    pub occupied_option_fee_rate: f64,

    pub prefix_rebate_ann_rate: f64,
    #[serde(deserialize_with = "flag")]
    pub prefix_rebate_ann_need: bool,
    pub prefix_rebate_abs_rate: f64,
    #[serde(deserialize_with = "flag")]
    pub prefix_rebate_abs_need: bool,
    pub suffix_rebate_ann_rate: f64,
    #[serde(deserialize_with = "flag")]
    pub suffix_rebate_ann_need: bool,
    pub suffix_rebate_abs_rate: f64,
    #[serde(deserialize_with = "flag")]
    pub suffix_rebate_abs_need: bool,
    #[serde(deserialize_with = "flag")]
    pub discount_rebate: bool,
    #[serde(deserialize_with = "flag")]
    pub compound_rebate: bool,

    pub payoff_calc_method: u8,

    pub calc_price: Vec<f64>,
    pub run_from: usize,
    pub run_days: usize,

    pub runs_step_n: usize,
    pub year_days_n: usize,
    pub trading_days_n: Vec<usize>,

    pub calc_greek: String,
}

impl SharkfinRequest {
    pub fn from_json(json: &str) -> SharkfinResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> SharkfinResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// One-year American double shark-fin: barriers 95%/105%, strikes 99%/101%,
    /// 3.5% annualized knock-out rate, short book, priced on a 90..=110 grid.
    pub fn double_sharkfin_example() -> Self {
        SharkfinRequest {
            rand_rows: 50_000,
            rand_cols: 250,
            rand_quasi: false,
            rand_seed: vec![0, 1, 2, 3, 4, 5, 6, 7],
            dual_smooth: true,
            runs_size: 100_000,
            runs_step: 244,
            year_days: 244,
            sigma: 0.16,
            basis_rate: 0.06,
            risk_free_rate: 0.03,
            price_limit_ratio: 0.1,
            price_limit_style: 0,
            notional: 100_000.0,
            trade_long: false,
            option_type: 2,
            barrier_type: 3,
            start_price: 100.0,
            h_l: 0.95,
            h_h: 1.05,
            k_l: 0.99,
            k_h: 1.01,
            x_l: 0.035,
            x_h: 0.035,
            p_l: 1.0,
            p_h: 1.0,
            option_fee: 0.035,
            option_fee_interest: 0.03,
            is_kop_delay: true,
            calc_price: (90..=110).map(f64::from).collect(),
            run_from: 0,
            run_days: 1,
            ..Default::default()
        }
    }
}

/// Barrier observation style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionStyle {
    /// Knock-out checked on the final observation only.
    European,
    /// Knock-out checked on every observed close.
    American,
}

/// Barrier topology of the structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarrierTopology {
    /// Up-and-out call shark-fin.
    UpOut,
    /// Down-and-out put shark-fin.
    DownOut,
    /// Up-and-out call plus down-and-out put.
    DoubleOut,
}

/// Daily price-limit handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitMode {
    None,
    /// Excess move is pushed into the following day(s).
    Carry,
    /// Excess move is discarded.
    Clip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeDirection {
    Long,
    Short,
}

impl TradeDirection {
    pub fn sign(self) -> f64 {
        match self {
            TradeDirection::Long => 1.0,
            TradeDirection::Short => -1.0,
        }
    }
}

/// When the option fee changes hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeTiming {
    /// Paid at inception.
    Front,
    /// Paid when the structure terminates.
    Back,
}

/// How an amount is carried to the measurement date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DiscountPolicy {
    None,
    /// Discounted to the valuation date at the risk-free rate.
    Discount,
    /// Accrued forward to the termination date at the given rate.
    Compound { rate: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccrualBasis {
    /// Rate is per annum and scaled by the accrual period.
    Annualized,
    /// Rate is paid as is.
    Absolute,
}

impl AccrualBasis {
    pub fn from_abs_flag(absolute: bool) -> Self {
        if absolute {
            AccrualBasis::Absolute
        } else {
            AccrualBasis::Annualized
        }
    }
}

/// Settlement of an American knock-out payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KnockOutSettlement {
    Immediate,
    Deferred,
}

/// Sensitivity selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Greek {
    Delta,
    Gamma,
    Vega,
    Theta,
    Rho,
}

impl Greek {
    pub const ALL: [Greek; 5] = [Greek::Delta, Greek::Gamma, Greek::Vega, Greek::Theta, Greek::Rho];

    /// Parses the one-character wire tag (`d`, `g`, `v`, `t`, `r`).
    pub fn from_tag(tag: &str) -> Option<Greek> {
        match tag {
            "d" => Some(Greek::Delta),
            "g" => Some(Greek::Gamma),
            "v" => Some(Greek::Vega),
            "t" => Some(Greek::Theta),
            "r" => Some(Greek::Rho),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Greek::Delta => "d",
            Greek::Gamma => "g",
            Greek::Vega => "v",
            Greek::Theta => "t",
            Greek::Rho => "r",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Greek::Delta => "delta",
            Greek::Gamma => "gamma",
            Greek::Vega => "vega",
            Greek::Theta => "theta",
            Greek::Rho => "rho",
        }
    }
}

/// Simulation controls.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationControls {
    pub runs_size: usize,
    pub runs_step: usize,
    pub year_days: usize,
    pub rand_rows: usize,
    pub rand_cols: usize,
    pub seeds: Vec<u64>,
    pub quasi: bool,
    pub dual_smooth: bool,
}

impl SimulationControls {
    /// Deviate rows needed to cover `runs_size` paths.
    pub fn rows_needed(&self) -> usize {
        if self.dual_smooth {
            (self.runs_size + 1) / 2
        } else {
            self.runs_size
        }
    }

    pub fn validate(&self) -> SharkfinResult<()> {
        validate_paths(self.runs_size)?;
        validate_steps(self.runs_step)?;
        if self.year_days == 0 {
            return Err(SharkfinError::invalid_config("year_days", "must be greater than 0"));
        }
        if self.seeds.is_empty() {
            return Err(SharkfinError::invalid_config(
                "rand_seed",
                "at least one seed is required",
            ));
        }
        if self.quasi && self.seeds.len() > 1 {
            return Err(SharkfinError::invalid_config(
                "rand_seed",
                format!(
                    "quasi-random generation takes exactly one seed, got {}",
                    self.seeds.len()
                ),
            ));
        }
        if self.rand_rows < self.rows_needed() {
            return Err(SharkfinError::invalid_config(
                "rand_rows",
                format!(
                    "{} rows cannot cover {} paths (need {})",
                    self.rand_rows,
                    self.runs_size,
                    self.rows_needed()
                ),
            ));
        }
        if self.rand_cols < self.runs_step {
            return Err(SharkfinError::invalid_config(
                "rand_cols",
                format!(
                    "{} columns cannot cover {} steps",
                    self.rand_cols, self.runs_step
                ),
            ));
        }
        Ok(())
    }
}

/// Market inputs driving the path dynamics and discounting.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketInputs {
    pub sigma: f64,
    pub basis_rate: f64,
    pub risk_free_rate: f64,
    pub is_futures: bool,
    pub limit_ratio: f64,
    pub limit_mode: LimitMode,
}

impl MarketInputs {
    /// Cost-of-carry drift of the underlying.
    ///
    /// Futures carry nothing; for FX underlyings `basis_rate` is the foreign rate.
    pub fn carry(&self) -> f64 {
        if self.is_futures {
            0.0
        } else {
            self.risk_free_rate - self.basis_rate
        }
    }
}

/// Contract terms. Barrier and strike levels are ratios of `start_price`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductTerms {
    pub style: OptionStyle,
    pub topology: BarrierTopology,
    pub reverse_knock_out: bool,
    pub direction: TradeDirection,
    pub start_price: f64,
    pub notional: f64,
    pub h_l: f64,
    pub h_h: f64,
    pub k_l: f64,
    pub k_h: f64,
    pub x_l: f64,
    pub x_h: f64,
    pub p_l: f64,
    pub p_h: f64,
    pub payoff_basis: AccrualBasis,
    pub knock_out_settlement: KnockOutSettlement,
}

/// A rebate leg switched on by its `*_need` flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rebate {
    pub rate: f64,
    pub basis: AccrualBasis,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionFee {
    pub rate: f64,
    pub interest: f64,
    pub timing: FeeTiming,
    pub basis: AccrualBasis,
    pub policy: DiscountPolicy,
    /// Hedge fees fall due at termination, so only discounting applies.
    pub hedge_policy: DiscountPolicy,
    pub consumed_rate: f64,
    pub occupied_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CashflowTerms {
    pub fee: OptionFee,
    pub margin_rate: f64,
    pub margin_interest: f64,
    pub margin_policy: DiscountPolicy,
    pub payoff_policy: DiscountPolicy,
    pub prefix_rebates: Vec<Rebate>,
    pub prefix_policy: DiscountPolicy,
    pub suffix_rebates: Vec<Rebate>,
    pub suffix_policy: DiscountPolicy,
}

/// Lifecycle state of an already-running trade.
#[derive(Debug, Clone, PartialEq)]
pub struct Lifecycle {
    /// Recorded knock-out price when the trade has already knocked out.
    pub knocked_out_at: Option<f64>,
    pub market_close: bool,
    pub extend_end_days: usize,
}

/// Trading-day to natural-day calendar.
///
/// Index `n` counts trading-day closes since inception: `0` is inception,
/// `runs_step` is maturity and `runs_step + extend_end_days` is settlement.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    natural_days: Vec<f64>,
    year_days_n: f64,
    maturity: usize,
    settlement: usize,
}

impl Schedule {
    fn resolve(request: &SharkfinRequest) -> SharkfinResult<Self> {
        let maturity = request.runs_step;
        let settlement = request.runs_step + request.extend_end_days;
        let year_days_n = if request.year_days_n > 0 {
            request.year_days_n
        } else {
            request.year_days
        };
        if year_days_n == 0 {
            return Err(SharkfinError::invalid_config("year_days_n", "must be greater than 0"));
        }

        let natural_days: Vec<f64> = if !request.trading_days_n.is_empty() {
            if request.trading_days_n.len() < settlement {
                return Err(SharkfinError::invalid_config(
                    "trading_days_n",
                    format!(
                        "{} entries cannot cover {} trading days",
                        request.trading_days_n.len(),
                        settlement
                    ),
                ));
            }
            if request.trading_days_n.windows(2).any(|w| w[1] <= w[0])
                || request.trading_days_n[0] == 0
            {
                return Err(SharkfinError::invalid_config(
                    "trading_days_n",
                    "must be strictly increasing positive natural days",
                ));
            }
            std::iter::once(0.0)
                .chain(request.trading_days_n[..settlement].iter().map(|&d| d as f64))
                .collect()
        } else if request.runs_step_n > 0 {
            let scale = request.runs_step_n as f64 / settlement as f64;
            (0..=settlement).map(|n| n as f64 * scale).collect()
        } else {
            (0..=settlement).map(|n| n as f64).collect()
        };

        Ok(Schedule {
            natural_days,
            year_days_n: year_days_n as f64,
            maturity,
            settlement,
        })
    }

    pub fn maturity(&self) -> usize {
        self.maturity
    }

    pub fn settlement(&self) -> usize {
        self.settlement
    }

    /// Natural days elapsed at trading-day index `n`.
    pub fn natural_day(&self, n: usize) -> f64 {
        self.natural_days[n.min(self.settlement)]
    }

    /// Year fraction from inception to trading-day index `n`.
    pub fn tau(&self, n: usize) -> f64 {
        self.natural_day(n) / self.year_days_n
    }
}

/// Starting prices and run window to evaluate.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationGrid {
    pub calc_price: Vec<f64>,
    pub run_from: usize,
    pub run_days: usize,
}

impl EvaluationGrid {
    pub fn days(&self) -> std::ops::Range<usize> {
        self.run_from..self.run_from + self.run_days
    }
}

/// Immutable, validated pricing configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SharkfinConfig {
    pub simulation: SimulationControls,
    pub market: MarketInputs,
    pub product: ProductTerms,
    pub cashflows: CashflowTerms,
    pub lifecycle: Lifecycle,
    pub schedule: Schedule,
    pub grid: EvaluationGrid,
    pub greek: Option<Greek>,
}

impl SharkfinConfig {
    pub fn from_json(json: &str) -> SharkfinResult<Self> {
        Self::from_request(&SharkfinRequest::from_json(json)?)
    }

    /// Validates `request` and resolves every fallback.
    pub fn from_request(request: &SharkfinRequest) -> SharkfinResult<Self> {
        let simulation = SimulationControls {
            runs_size: request.runs_size,
            runs_step: request.runs_step,
            year_days: request.year_days,
            rand_rows: if request.rand_rows > 0 {
                request.rand_rows
            } else if request.dual_smooth {
                (request.runs_size + 1) / 2
            } else {
                request.runs_size
            },
            rand_cols: if request.rand_cols > 0 {
                request.rand_cols
            } else {
                request.runs_step
            },
            seeds: request.rand_seed.clone(),
            quasi: request.rand_quasi,
            dual_smooth: request.dual_smooth,
        };
        simulation.validate()?;

        let market = Self::resolve_market(request)?;
        let product = Self::resolve_product(request)?;
        let cashflows = Self::resolve_cashflows(request)?;

        let knocked_out_at = if request.knock_o_occur {
            if product.topology == BarrierTopology::DoubleOut {
                validate_positive("knock_o_point", request.knock_o_point)?;
            }
            Some(request.knock_o_point)
        } else {
            None
        };
        let lifecycle = Lifecycle {
            knocked_out_at,
            market_close: request.market_close,
            extend_end_days: request.extend_end_days,
        };

        let schedule = Schedule::resolve(request)?;

        if request.calc_price.is_empty() {
            return Err(SharkfinError::invalid_config(
                "calc_price",
                "at least one starting price is required",
            ));
        }
        for &price in &request.calc_price {
            validate_positive("calc_price", price)?;
        }
        let run_days = request.run_days.max(1);
        if request.run_from + run_days > request.runs_step {
            return Err(SharkfinError::invalid_config(
                "run_days",
                format!(
                    "window {}..{} exceeds the {} trading days of the product",
                    request.run_from,
                    request.run_from + run_days,
                    request.runs_step
                ),
            ));
        }
        let grid = EvaluationGrid {
            calc_price: request.calc_price.clone(),
            run_from: request.run_from,
            run_days,
        };

        let greek = if request.calc_greek.is_empty() {
            None
        } else {
            Some(Greek::from_tag(&request.calc_greek).ok_or_else(|| {
                SharkfinError::invalid_config(
                    "calc_greek",
                    format!("unknown greek tag '{}'", request.calc_greek),
                )
            })?)
        };

        if request.payoff_calc_method != 0 {
            return Err(SharkfinError::invalid_config(
                "payoff_calc_method",
                format!("unsupported method {}", request.payoff_calc_method),
            ));
        }

        if product.style == OptionStyle::European && request.is_kop_delay {
            tracing::debug!("is_kop_delay has no effect on European barriers");
        }
        if product.topology == BarrierTopology::DoubleOut && request.reverse_knock_out {
            tracing::warn!("reverse_knock_out is ignored for double-out barriers");
        }

        Ok(SharkfinConfig {
            simulation,
            market,
            product,
            cashflows,
            lifecycle,
            schedule,
            grid,
            greek,
        })
    }

    fn resolve_market(request: &SharkfinRequest) -> SharkfinResult<MarketInputs> {
        validate_non_negative("sigma", request.sigma)?;
        validate_finite("sigma", request.sigma)?;
        validate_finite("basis_rate", request.basis_rate)?;
        validate_finite("risk_free_rate", request.risk_free_rate)?;
        validate_range("price_limit_ratio", request.price_limit_ratio, 0.0, 1.0)?;

        let limit_mode = match request.price_limit_style {
            0 => LimitMode::None,
            1 => LimitMode::Carry,
            2 => LimitMode::Clip,
            other => {
                return Err(SharkfinError::invalid_config(
                    "price_limit_style",
                    format!("expected 0, 1 or 2, got {}", other),
                ))
            }
        };
        let limit_mode = if request.price_limit_ratio == 0.0 {
            LimitMode::None
        } else {
            limit_mode
        };

        Ok(MarketInputs {
            sigma: request.sigma,
            basis_rate: request.basis_rate,
            risk_free_rate: request.risk_free_rate,
            is_futures: request.is_futures,
            limit_ratio: request.price_limit_ratio,
            limit_mode,
        })
    }

    fn resolve_product(request: &SharkfinRequest) -> SharkfinResult<ProductTerms> {
        let style = match request.option_type {
            1 => OptionStyle::European,
            2 => OptionStyle::American,
            other => {
                return Err(SharkfinError::invalid_config(
                    "option_type",
                    format!("expected 1 (European) or 2 (American), got {}", other),
                ))
            }
        };
        let topology = match request.barrier_type {
            1 => BarrierTopology::UpOut,
            2 => BarrierTopology::DownOut,
            3 => BarrierTopology::DoubleOut,
            other => {
                return Err(SharkfinError::invalid_config(
                    "barrier_type",
                    format!("expected 1, 2 or 3, got {}", other),
                ))
            }
        };

        validate_positive("start_price", request.start_price)?;
        validate_finite("notional", request.notional)?;
        validate_non_negative("notional", request.notional)?;
        for (name, value) in [
            ("k_l", request.k_l),
            ("k_h", request.k_h),
            ("x_l", request.x_l),
            ("x_h", request.x_h),
            ("p_l", request.p_l),
            ("p_h", request.p_h),
        ] {
            validate_finite(name, value)?;
            validate_non_negative(name, value)?;
        }
        validate_finite("h_l", request.h_l)?;
        validate_finite("h_h", request.h_h)?;

        let uses_upper = matches!(
            (topology, request.reverse_knock_out),
            (BarrierTopology::UpOut, false)
                | (BarrierTopology::DownOut, true)
                | (BarrierTopology::DoubleOut, _)
        );
        let uses_lower = matches!(
            (topology, request.reverse_knock_out),
            (BarrierTopology::DownOut, false)
                | (BarrierTopology::UpOut, true)
                | (BarrierTopology::DoubleOut, _)
        );
        if uses_upper {
            validate_positive("h_h", request.h_h)?;
        }
        if uses_lower {
            validate_positive("h_l", request.h_l)?;
        }
        if topology == BarrierTopology::DoubleOut && !(request.h_l < 1.0 && 1.0 < request.h_h) {
            return Err(SharkfinError::invalid_config(
                "h_l/h_h",
                format!(
                    "double-out barriers must straddle the start: h_l={} < 1 < h_h={}",
                    request.h_l, request.h_h
                ),
            ));
        }
        if request.k_l > request.k_h {
            return Err(SharkfinError::invalid_config(
                "k_l/k_h",
                format!("k_l={} must not exceed k_h={}", request.k_l, request.k_h),
            ));
        }

        Ok(ProductTerms {
            style,
            topology,
            reverse_knock_out: request.reverse_knock_out && topology != BarrierTopology::DoubleOut,
            direction: if request.trade_long {
                TradeDirection::Long
            } else {
                TradeDirection::Short
            },
            start_price: request.start_price,
            notional: if request.notional > 0.0 {
                request.notional
            } else {
                1.0
            },
            h_l: request.h_l,
            h_h: request.h_h,
            k_l: request.k_l,
            k_h: request.k_h,
            x_l: request.x_l,
            x_h: request.x_h,
            p_l: request.p_l,
            p_h: request.p_h,
            payoff_basis: AccrualBasis::from_abs_flag(request.strike_payoff_abs),
            knock_out_settlement: if style == OptionStyle::European || request.is_kop_delay {
                KnockOutSettlement::Deferred
            } else {
                KnockOutSettlement::Immediate
            },
        })
    }

    fn resolve_cashflows(request: &SharkfinRequest) -> SharkfinResult<CashflowTerms> {
        for (name, value) in [
            ("option_fee", request.option_fee),
            ("option_fee_interest", request.option_fee_interest),
            ("margin_rate", request.margin_rate),
            ("margin_interest", request.margin_interest),
            ("consumed_option_fee_rate", request.consumed_option_fee_rate),
            ("occupied_option_fee_rate", request.occupied_option_fee_rate),
            ("prefix_rebate_ann_rate", request.prefix_rebate_ann_rate),
            ("prefix_rebate_abs_rate", request.prefix_rebate_abs_rate),
            ("suffix_rebate_ann_rate", request.suffix_rebate_ann_rate),
            ("suffix_rebate_abs_rate", request.suffix_rebate_abs_rate),
        ] {
            validate_finite(name, value)?;
        }
        validate_non_negative("margin_rate", request.margin_rate)?;
        validate_range(
            "consumed_option_fee_rate",
            request.consumed_option_fee_rate,
            0.0,
            1.0 + f64::EPSILON,
        )?;
        validate_range(
            "occupied_option_fee_rate",
            request.occupied_option_fee_rate,
            0.0,
            1.0 + f64::EPSILON,
        )?;

        let timing = if request.back_end_load {
            FeeTiming::Back
        } else {
            FeeTiming::Front
        };
        // Front-loaded amounts are paid at inception, so only compounding can move
        // them; back-loaded amounts are paid at termination, so only discounting can.
        let fee_policy = match timing {
            FeeTiming::Front if request.compound_option_fee => DiscountPolicy::Compound {
                rate: request.option_fee_interest,
            },
            FeeTiming::Back if request.discount_option_fee => DiscountPolicy::Discount,
            _ => DiscountPolicy::None,
        };
        let discount_if = |on: bool| {
            if on {
                DiscountPolicy::Discount
            } else {
                DiscountPolicy::None
            }
        };

        let rebates = |ann_need, ann_rate, abs_need, abs_rate| {
            let mut legs = Vec::new();
            if ann_need {
                legs.push(Rebate {
                    rate: ann_rate,
                    basis: AccrualBasis::Annualized,
                });
            }
            if abs_need {
                legs.push(Rebate {
                    rate: abs_rate,
                    basis: AccrualBasis::Absolute,
                });
            }
            legs
        };

        Ok(CashflowTerms {
            fee: OptionFee {
                rate: request.option_fee,
                interest: request.option_fee_interest,
                timing,
                basis: AccrualBasis::from_abs_flag(request.strike_payoff_abs),
                policy: fee_policy,
                hedge_policy: discount_if(request.discount_option_fee),
                consumed_rate: request.consumed_option_fee_rate,
                occupied_rate: request.occupied_option_fee_rate,
            },
            margin_rate: request.margin_rate,
            margin_interest: request.margin_interest,
            margin_policy: discount_if(request.discount_margin),
            payoff_policy: discount_if(request.discount_payoff),
            prefix_rebates: rebates(
                request.prefix_rebate_ann_need,
                request.prefix_rebate_ann_rate,
                request.prefix_rebate_abs_need,
                request.prefix_rebate_abs_rate,
            ),
            prefix_policy: if request.compound_rebate {
                DiscountPolicy::Compound {
                    rate: request.option_fee_interest,
                }
            } else {
                DiscountPolicy::None
            },
            suffix_rebates: rebates(
                request.suffix_rebate_ann_need,
                request.suffix_rebate_ann_rate,
                request.suffix_rebate_abs_need,
                request.suffix_rebate_abs_rate,
            ),
            suffix_policy: discount_if(request.discount_rebate),
        })
    }

    /// Absolute upper barrier level.
    pub fn upper_barrier(&self) -> f64 {
        self.product.h_h * self.product.start_price
    }

    /// Absolute lower barrier level.
    pub fn lower_barrier(&self) -> f64 {
        self.product.h_l * self.product.start_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_request_resolves() {
        let cfg = SharkfinConfig::from_request(&SharkfinRequest::double_sharkfin_example())
            .expect("example request is valid");
        assert_eq!(cfg.product.topology, BarrierTopology::DoubleOut);
        assert_eq!(cfg.product.style, OptionStyle::American);
        assert_eq!(cfg.product.direction, TradeDirection::Short);
        assert_eq!(cfg.product.knock_out_settlement, KnockOutSettlement::Deferred);
        assert_eq!(cfg.grid.calc_price.len(), 21);
        assert_eq!(cfg.schedule.settlement(), 244);
        assert!((cfg.schedule.tau(244) - 1.0).abs() < 1e-12);
        assert!((cfg.upper_barrier() - 105.0).abs() < 1e-12);
    }

    #[test]
    fn test_defaults_resolved_at_construction() {
        let request = SharkfinRequest {
            rand_rows: 0,
            rand_cols: 0,
            runs_size: 1001,
            runs_step: 10,
            extend_end_days: 2,
            year_days_n: 0,
            ..SharkfinRequest::double_sharkfin_example()
        };
        let cfg = SharkfinConfig::from_request(&request).expect("valid");
        assert_eq!(cfg.simulation.rand_rows, 501);
        assert_eq!(cfg.simulation.rand_cols, 10);
        assert_eq!(cfg.schedule.settlement(), 12);
        assert!((cfg.schedule.tau(12) - 12.0 / 244.0).abs() < 1e-12);
    }

    #[test]
    fn test_natural_day_calendar() {
        let request = SharkfinRequest {
            runs_step: 4,
            run_days: 1,
            year_days_n: 365,
            trading_days_n: vec![1, 4, 5, 6],
            ..SharkfinRequest::double_sharkfin_example()
        };
        let cfg = SharkfinConfig::from_request(&request).expect("valid");
        assert_eq!(cfg.schedule.natural_day(0), 0.0);
        assert_eq!(cfg.schedule.natural_day(2), 4.0);
        assert!((cfg.schedule.tau(4) - 6.0 / 365.0).abs() < 1e-12);

        let scaled = SharkfinRequest {
            runs_step: 4,
            runs_step_n: 8,
            ..SharkfinRequest::double_sharkfin_example()
        };
        let cfg = SharkfinConfig::from_request(&scaled).expect("valid");
        assert_eq!(cfg.schedule.natural_day(4), 8.0);
    }

    #[test]
    fn test_flags_accept_integers() {
        let json = r#"{"dual_smooth": 1, "trade_long": 0, "rand_quasi": false, "runs_size": 10}"#;
        let request = SharkfinRequest::from_json(json).expect("parses");
        assert!(request.dual_smooth);
        assert!(!request.trade_long);
        assert_eq!(request.runs_size, 10);
        assert_eq!(request.sigma, 0.0);
    }

    #[test]
    fn test_request_json_round_trip_keeps_wire_names() {
        let json = SharkfinRequest::double_sharkfin_example()
            .to_json()
            .expect("serializes");
        assert!(json.contains("\"knock_o_point\""));
        assert!(json.contains("\"calc_price\""));
        let back = SharkfinRequest::from_json(&json).expect("parses");
        assert_eq!(back, SharkfinRequest::double_sharkfin_example());
    }

    #[test]
    fn test_rejects_structural_errors() {
        let base = SharkfinRequest::double_sharkfin_example();

        let cases = vec![
            SharkfinRequest { runs_size: 0, ..base.clone() },
            SharkfinRequest { runs_step: 0, ..base.clone() },
            SharkfinRequest { k_l: 1.02, k_h: 1.01, ..base.clone() },
            SharkfinRequest { h_l: 1.01, ..base.clone() },
            SharkfinRequest { rand_quasi: true, ..base.clone() },
            SharkfinRequest { rand_seed: vec![], ..base.clone() },
            SharkfinRequest { rand_rows: 10, ..base.clone() },
            SharkfinRequest { rand_cols: 100, ..base.clone() },
            SharkfinRequest { option_type: 0, ..base.clone() },
            SharkfinRequest { barrier_type: 4, ..base.clone() },
            SharkfinRequest { price_limit_style: 3, ..base.clone() },
            SharkfinRequest { calc_price: vec![], ..base.clone() },
            SharkfinRequest { calc_greek: "x".to_string(), ..base.clone() },
            SharkfinRequest { run_from: 244, ..base.clone() },
            SharkfinRequest { sigma: -0.1, ..base.clone() },
        ];
        for request in cases {
            assert!(
                SharkfinConfig::from_request(&request).is_err(),
                "expected rejection for {:?}",
                request
            );
        }
    }

    #[test]
    fn test_fee_policy_follows_timing() {
        let front = SharkfinRequest {
            compound_option_fee: true,
            discount_option_fee: true,
            ..SharkfinRequest::double_sharkfin_example()
        };
        let cfg = SharkfinConfig::from_request(&front).expect("valid");
        assert_eq!(
            cfg.cashflows.fee.policy,
            DiscountPolicy::Compound { rate: 0.03 }
        );

        let back = SharkfinRequest {
            back_end_load: true,
            ..front
        };
        let cfg = SharkfinConfig::from_request(&back).expect("valid");
        assert_eq!(cfg.cashflows.fee.policy, DiscountPolicy::Discount);
    }

    #[test]
    fn test_reverse_knock_out_ignored_for_double() {
        let request = SharkfinRequest {
            reverse_knock_out: true,
            ..SharkfinRequest::double_sharkfin_example()
        };
        let cfg = SharkfinConfig::from_request(&request).expect("valid");
        assert!(!cfg.product.reverse_knock_out);
    }

    #[test]
    fn test_fx_underlying_carries_like_spot() {
        let spot = SharkfinRequest {
            basis_rate: 0.01,
            ..SharkfinRequest::double_sharkfin_example()
        };
        let fx = SharkfinRequest {
            is_foreign: true,
            ..spot.clone()
        };
        let spot = SharkfinConfig::from_request(&spot).expect("valid");
        let fx = SharkfinConfig::from_request(&fx).expect("valid");
        assert_eq!(fx.market, spot.market);
        assert!((fx.market.carry() - 0.02).abs() < 1e-15);
    }
}
