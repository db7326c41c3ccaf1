// src/analytics/bs_analytic.rs
//! Closed-form Black-Scholes values with cost of carry
//!
//! # Mathematical Foundation
//!
//! The underlying follows
//! ```text
//! dS_t = b S_t dt + σ S_t dW_t
//! ```
//! under the risk-neutral measure, with carry `b` (`b = r` for a non-dividend stock,
//! `b = 0` for a futures contract, `b = r − r_f` for an FX rate). With
//! ```text
//! d₁ = [ln(S/K) + (b + σ²/2)T] / (σ√T)
//! d₂ = d₁ − σ√T
//! ```
//! the forward-measure expectations are
//! ```text
//! E[(S_T − K)⁺] = S e^(bT) Φ(d₁) − K Φ(d₂)
//! P(S_T ≥ K)    = Φ(d₂)
//! ```
//!
//! A shark-fin observed only at maturity (European) decomposes into a call spread,
//! a digital and a knock-out rebate, which gives the benchmark the Monte Carlo
//! engine is checked against.

use crate::config::{AccrualBasis, BarrierTopology, OptionStyle, SharkfinConfig};
use crate::error::{SharkfinError, SharkfinResult};
use crate::math_utils::norm_cdf;

/// Below this total volatility `σ√T` the terminal price is treated as deterministic.
const MIN_TOTAL_VOL: f64 = 1e-12;

fn d1_d2(s: f64, k: f64, b: f64, sigma: f64, t: f64) -> (f64, f64) {
    let vol = sigma * t.sqrt();
    let d1 = ((s / k).ln() + (b + 0.5 * sigma * sigma) * t) / vol;
    (d1, d1 - vol)
}

/// Undiscounted expected call payoff `E[(S_T − K)⁺]`.
pub fn forward_call(s: f64, k: f64, b: f64, sigma: f64, t: f64) -> f64 {
    let forward = s * (b * t).exp();
    if sigma * t.sqrt() < MIN_TOTAL_VOL {
        return (forward - k).max(0.0);
    }
    let (d1, d2) = d1_d2(s, k, b, sigma, t);
    forward * norm_cdf(d1) - k * norm_cdf(d2)
}

/// Undiscounted expected put payoff `E[(K − S_T)⁺]`.
pub fn forward_put(s: f64, k: f64, b: f64, sigma: f64, t: f64) -> f64 {
    let forward = s * (b * t).exp();
    if sigma * t.sqrt() < MIN_TOTAL_VOL {
        return (k - forward).max(0.0);
    }
    let (d1, d2) = d1_d2(s, k, b, sigma, t);
    k * norm_cdf(-d2) - forward * norm_cdf(-d1)
}

/// Risk-neutral probability `P(S_T ≥ K)`.
pub fn prob_above(s: f64, k: f64, b: f64, sigma: f64, t: f64) -> f64 {
    if sigma * t.sqrt() < MIN_TOTAL_VOL {
        return if s * (b * t).exp() >= k { 1.0 } else { 0.0 };
    }
    norm_cdf(d1_d2(s, k, b, sigma, t).1)
}

/// Black-Scholes European call option price
///
/// # Formula
/// ```text
/// C(S,K,r,σ,T) = S*Φ(d₁) - K*e^(-rT)*Φ(d₂)
/// ```
pub fn bs_call_price(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    generalized_call(s, k, r, r, sigma, t)
}

/// Black-Scholes European put option price
pub fn bs_put_price(s: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    generalized_put(s, k, r, r, sigma, t)
}

/// Generalised Black-Scholes call with carry `b`.
pub fn generalized_call(s: f64, k: f64, r: f64, b: f64, sigma: f64, t: f64) -> f64 {
    (-r * t).exp() * forward_call(s, k, b, sigma, t)
}

/// Generalised Black-Scholes put with carry `b`.
pub fn generalized_put(s: f64, k: f64, r: f64, b: f64, sigma: f64, t: f64) -> f64 {
    (-r * t).exp() * forward_put(s, k, b, sigma, t)
}

/// Cash-or-nothing call paying 1 when `S_T ≥ K`.
pub fn cash_or_nothing_call(s: f64, k: f64, r: f64, b: f64, sigma: f64, t: f64) -> f64 {
    (-r * t).exp() * prob_above(s, k, b, sigma, t)
}

/// Cash-or-nothing put paying 1 when `S_T ≤ K`.
pub fn cash_or_nothing_put(s: f64, k: f64, r: f64, b: f64, sigma: f64, t: f64) -> f64 {
    (-r * t).exp() * (1.0 - prob_above(s, k, b, sigma, t))
}

/// European (maturity-only) shark-fin in closed form.
///
/// Per unit of notional, for a long book:
/// ```text
/// up-out:   p_h/S₀ · [E(S−K_h)⁺ − E(S−H_h)⁺ − (H_h−K_h)·P(S≥H_h)] + x_h·P(S≥H_h)
/// down-out: p_l/S₀ · [E(K_l−S)⁺ − E(H_l−S)⁺ − (K_l−H_l)·P(S≤H_l)] + x_l·P(S≤H_l)
/// ```
/// discounted from the payment date; double-out is the sum of both.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalSharkfin {
    pub topology: BarrierTopology,
    pub start_price: f64,
    pub k_l: f64,
    pub k_h: f64,
    pub h_l: f64,
    pub h_h: f64,
    pub p_l: f64,
    pub p_h: f64,
    /// Knock-out returns, already accrued to the payment date.
    pub rebate_l: f64,
    pub rebate_h: f64,
    pub rate: f64,
    pub carry: f64,
    pub sigma: f64,
    /// Years of diffusion until the barrier observation.
    pub expiry: f64,
    /// Years until payment.
    pub pay_time: f64,
}

impl TerminalSharkfin {
    /// Benchmark for a European config valued on `day`, with the daily calendar
    /// the path simulation uses.
    pub fn from_config(config: &SharkfinConfig, day: usize) -> SharkfinResult<Self> {
        let p = &config.product;
        if p.style != OptionStyle::European || p.reverse_knock_out {
            return Err(SharkfinError::UnsupportedOperation {
                operation: "closed-form shark-fin".to_string(),
                context: "only plain European barriers have a terminal closed form".to_string(),
            });
        }
        let schedule = &config.schedule;
        let first = day + usize::from(config.lifecycle.market_close);
        let settlement = schedule.settlement();
        let accrued = |rate: f64| match p.payoff_basis {
            AccrualBasis::Absolute => rate,
            AccrualBasis::Annualized => rate * schedule.tau(settlement),
        };
        Ok(TerminalSharkfin {
            topology: p.topology,
            start_price: p.start_price,
            k_l: p.k_l,
            k_h: p.k_h,
            h_l: p.h_l,
            h_h: p.h_h,
            p_l: p.p_l,
            p_h: p.p_h,
            rebate_l: accrued(p.x_l),
            rebate_h: accrued(p.x_h),
            rate: config.market.risk_free_rate,
            carry: config.market.carry(),
            sigma: config.market.sigma,
            expiry: (schedule.maturity().saturating_sub(first)) as f64
                / config.simulation.year_days as f64,
            pay_time: (schedule.tau(settlement) - schedule.tau(first)).max(0.0),
        })
    }

    /// Up-out call leg per unit notional, undiscounted.
    fn up_leg(&self, s: f64) -> f64 {
        let (b, sig, t) = (self.carry, self.sigma, self.expiry);
        let strike = self.k_h * self.start_price;
        let barrier = self.h_h * self.start_price;
        let p_knock = prob_above(s, barrier, b, sig, t);
        let spread = forward_call(s, strike, b, sig, t)
            - forward_call(s, barrier, b, sig, t)
            - (barrier - strike) * p_knock;
        self.p_h / self.start_price * spread + self.rebate_h * p_knock
    }

    /// Down-out put leg per unit notional, undiscounted.
    fn down_leg(&self, s: f64) -> f64 {
        let (b, sig, t) = (self.carry, self.sigma, self.expiry);
        let strike = self.k_l * self.start_price;
        let barrier = self.h_l * self.start_price;
        let p_knock = 1.0 - prob_above(s, barrier, b, sig, t);
        let spread = forward_put(s, strike, b, sig, t)
            - forward_put(s, barrier, b, sig, t)
            - (strike - barrier) * p_knock;
        self.p_l / self.start_price * spread + self.rebate_l * p_knock
    }

    /// Present value per unit notional at spot `s`, long book.
    pub fn value(&self, s: f64) -> f64 {
        let legs = match self.topology {
            BarrierTopology::UpOut => self.up_leg(s),
            BarrierTopology::DownOut => self.down_leg(s),
            BarrierTopology::DoubleOut => self.up_leg(s) + self.down_leg(s),
        };
        (-self.rate * self.pay_time).exp() * legs
    }
}
