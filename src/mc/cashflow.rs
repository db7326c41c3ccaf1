//! Per-path cash-flow legs
//!
//! Every amount is first expressed for a long book and then signed by the trade
//! direction. Hedge fees are the exception: they are a cost to whichever side
//! hedges, so they keep their sign.
//!
//! # Carrying amounts to the measurement date
//!
//! ```text
//! Discount:  A · exp(−r · max(τ(day) − τ(origin), 0))
//! Compound:  A · exp(i · (τ(termination) − τ(day)))
//! ```
//! where `origin` is the first simulated day of the valuation window and
//! `termination` is the day the structure stops.

use crate::config::{AccrualBasis, DiscountPolicy, FeeTiming, SharkfinConfig};
use crate::math_utils::growth;
use crate::mc::barrier::{BarrierOutcome, ObservationWindow};
use crate::mc::payoffs::GrossPayoff;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LegKind {
    Exercise,
    KnockOut,
    OptionFee,
    HedgeFee,
    Margin,
    PrefixRebate,
    SuffixRebate,
}

impl LegKind {
    pub const ALL: [LegKind; 7] = [
        LegKind::Exercise,
        LegKind::KnockOut,
        LegKind::OptionFee,
        LegKind::HedgeFee,
        LegKind::Margin,
        LegKind::PrefixRebate,
        LegKind::SuffixRebate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LegKind::Exercise => "exercise",
            LegKind::KnockOut => "knock_out",
            LegKind::OptionFee => "option_fee",
            LegKind::HedgeFee => "hedge_fee",
            LegKind::Margin => "margin",
            LegKind::PrefixRebate => "prefix_rebate",
            LegKind::SuffixRebate => "suffix_rebate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Flow {
    Pay,
    Receive,
}

/// What the per-path legs are used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValuationMode {
    /// Fair value of the structure; the option fee is what is being priced, and
    /// the payoff is always discounted.
    Price,
    /// Full settlement view including fees.
    Payoff,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashflowRecord {
    pub leg: LegKind,
    /// Signed, book perspective.
    pub amount: f64,
    pub flow: Flow,
    /// Trading-day index of payment since inception.
    pub day: usize,
    /// Years from the valuation window origin to payment, never negative.
    pub time: f64,
    pub basis: AccrualBasis,
    pub present_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathCashflows {
    pub outcome: BarrierOutcome,
    pub legs: Vec<CashflowRecord>,
    pub net: f64,
}

/// Cash-flow breakdown of every path at one starting price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayoffBreakdown {
    pub paths: Vec<PathCashflows>,
}

impl PayoffBreakdown {
    /// Mean present value per leg kind, averaged over all paths.
    pub fn leg_means(&self) -> Vec<(LegKind, f64)> {
        let n = self.paths.len().max(1) as f64;
        LegKind::ALL
            .iter()
            .map(|&kind| {
                let total: f64 = self
                    .paths
                    .iter()
                    .flat_map(|p| p.legs.iter())
                    .filter(|leg| leg.leg == kind)
                    .map(|leg| leg.present_value)
                    .sum();
                (kind, total / n)
            })
            .collect()
    }

    pub fn mean_net(&self) -> f64 {
        let n = self.paths.len().max(1) as f64;
        self.paths.iter().map(|p| p.net).sum::<f64>() / n
    }

    pub fn knock_out_ratio(&self) -> f64 {
        let n = self.paths.len().max(1) as f64;
        self.paths.iter().filter(|p| p.outcome.knocked_out()).count() as f64 / n
    }
}

/// A leg before direction and carrying are applied.
struct LongLeg {
    leg: LegKind,
    amount: f64,
    day: usize,
    basis: AccrualBasis,
    policy: DiscountPolicy,
}

pub struct CashflowAggregator<'a> {
    config: &'a SharkfinConfig,
    window: ObservationWindow,
    mode: ValuationMode,
}

impl<'a> CashflowAggregator<'a> {
    pub fn new(
        config: &'a SharkfinConfig,
        window: ObservationWindow,
        mode: ValuationMode,
    ) -> Self {
        CashflowAggregator {
            config,
            window,
            mode,
        }
    }

    /// Visits every leg of one path in a fixed order.
    fn for_each_leg(
        &self,
        gross: &GrossPayoff,
        termination: usize,
        mut visit: impl FnMut(LongLeg),
    ) {
        let cf = &self.config.cashflows;
        let schedule = &self.config.schedule;
        let notional = self.config.product.notional;
        let maturity = schedule.maturity();
        let accrue = |rate: f64, basis: AccrualBasis, until: usize| match basis {
            AccrualBasis::Absolute => notional * rate,
            AccrualBasis::Annualized => notional * rate * schedule.tau(until),
        };

        visit(LongLeg {
            leg: gross.leg,
            amount: gross.amount,
            day: gross.day,
            basis: gross.basis,
            policy: match self.mode {
                ValuationMode::Price => DiscountPolicy::Discount,
                ValuationMode::Payoff => cf.payoff_policy,
            },
        });

        if self.mode == ValuationMode::Payoff {
            let fee = accrue(cf.fee.rate, cf.fee.basis, maturity);
            visit(LongLeg {
                leg: LegKind::OptionFee,
                amount: -fee,
                day: match cf.fee.timing {
                    FeeTiming::Front => 0,
                    FeeTiming::Back => termination,
                },
                basis: cf.fee.basis,
                policy: cf.fee.policy,
            });

            if cf.fee.consumed_rate != 0.0 || cf.fee.occupied_rate != 0.0 {
                let hedge = fee.abs()
                    * (cf.fee.consumed_rate
                        + cf.fee.occupied_rate * cf.fee.interest * schedule.tau(termination));
                visit(LongLeg {
                    leg: LegKind::HedgeFee,
                    amount: -hedge,
                    day: termination,
                    basis: AccrualBasis::Annualized,
                    policy: cf.fee.hedge_policy,
                });
            }
        }

        if cf.margin_rate != 0.0 {
            visit(LongLeg {
                leg: LegKind::Margin,
                amount: -notional * cf.margin_rate * cf.margin_interest * schedule.tau(termination),
                day: termination,
                basis: AccrualBasis::Annualized,
                policy: cf.margin_policy,
            });
        }

        for rebate in &cf.prefix_rebates {
            visit(LongLeg {
                leg: LegKind::PrefixRebate,
                amount: accrue(rebate.rate, rebate.basis, maturity),
                day: 0,
                basis: rebate.basis,
                policy: cf.prefix_policy,
            });
        }
        for rebate in &cf.suffix_rebates {
            visit(LongLeg {
                leg: LegKind::SuffixRebate,
                amount: accrue(rebate.rate, rebate.basis, termination),
                day: termination,
                basis: rebate.basis,
                policy: cf.suffix_policy,
            });
        }
    }

    fn signed(&self, leg: LegKind, amount: f64) -> f64 {
        match leg {
            LegKind::HedgeFee => amount,
            _ => self.config.product.direction.sign() * amount,
        }
    }

    /// Years from the window origin to `day`.
    pub fn time_to(&self, day: usize) -> f64 {
        let schedule = &self.config.schedule;
        (schedule.tau(day) - schedule.tau(self.window.origin_day())).max(0.0)
    }

    fn present_value(
        &self,
        amount: f64,
        day: usize,
        termination: usize,
        policy: DiscountPolicy,
    ) -> f64 {
        match policy {
            DiscountPolicy::None => amount,
            DiscountPolicy::Discount => {
                amount * growth(-self.config.market.risk_free_rate, self.time_to(day))
            }
            DiscountPolicy::Compound { rate } => {
                let schedule = &self.config.schedule;
                amount * growth(rate, schedule.tau(termination) - schedule.tau(day))
            }
        }
    }

    /// Itemised legs of one path.
    pub fn legs(&self, gross: &GrossPayoff, termination: usize) -> Vec<CashflowRecord> {
        let mut records = Vec::with_capacity(4);
        self.for_each_leg(gross, termination, |l| {
            let amount = self.signed(l.leg, l.amount);
            records.push(CashflowRecord {
                leg: l.leg,
                amount,
                flow: if amount < 0.0 { Flow::Pay } else { Flow::Receive },
                day: l.day,
                time: self.time_to(l.day),
                basis: l.basis,
                present_value: self.present_value(amount, l.day, termination, l.policy),
            });
        });
        records
    }

    /// Sum of present values over the legs of one path, without itemising.
    pub fn net(&self, gross: &GrossPayoff, termination: usize) -> f64 {
        let mut total = 0.0;
        self.for_each_leg(gross, termination, |l| {
            let amount = self.signed(l.leg, l.amount);
            total += self.present_value(amount, l.day, termination, l.policy);
        });
        total
    }

    pub fn path_cashflows(
        &self,
        outcome: BarrierOutcome,
        gross: &GrossPayoff,
        termination: usize,
    ) -> PathCashflows {
        let legs = self.legs(gross, termination);
        let net = legs.iter().map(|l| l.present_value).sum();
        PathCashflows { outcome, legs, net }
    }
}
