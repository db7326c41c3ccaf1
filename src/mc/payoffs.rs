//! Shark-fin payoff
//!
//! # Definitions
//!
//! All returns are relative to the contract start price `S₀`; amounts are
//! `notional × return`.
//!
//! ## Knocked out
//! - Upper side pays the knock-out rate `x_h`, lower side pays `x_l`
//! - Absolute basis pays the rate as is; annualised basis pays `rate × τ(payment day)`
//!
//! ## Survived to maturity
//! - **Call side**: `p_h · (S_T/S₀ − k_h)` when `S_T ≥ k_h · S₀`
//! - **Put side**: `p_l · (k_l − S_T/S₀)` when `S_T ≤ k_l · S₀`
//!
//! Up-out structures carry the call side, down-out the put side, double-out both.
//! Between the strikes the payoff is zero.

use crate::config::{
    AccrualBasis, BarrierTopology, KnockOutSettlement, OptionStyle, ProductTerms, Schedule,
    SharkfinConfig,
};
use crate::mc::barrier::{BarrierOutcome, BarrierSide, ObservationWindow};
use crate::mc::cashflow::LegKind;
use ndarray::ArrayView1;

/// Undiscounted long-book payoff of one path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrossPayoff {
    /// `Exercise` or `KnockOut`.
    pub leg: LegKind,
    /// Return relative to `S₀`, after accrual.
    pub ret: f64,
    pub amount: f64,
    /// Trading-day index of payment.
    pub day: usize,
    pub basis: AccrualBasis,
}

pub struct PayoffEvaluator<'a> {
    product: &'a ProductTerms,
    schedule: &'a Schedule,
    window: ObservationWindow,
}

impl<'a> PayoffEvaluator<'a> {
    pub fn new(config: &'a SharkfinConfig, window: ObservationWindow) -> Self {
        PayoffEvaluator {
            product: &config.product,
            schedule: &config.schedule,
            window,
        }
    }

    /// Day the structure stops: the knock day for immediately settled American
    /// knock-outs, the settlement day otherwise.
    pub fn termination_day(&self, outcome: &BarrierOutcome) -> usize {
        match outcome.breach {
            Some(breach)
                if !breach.recorded
                    && self.product.style == OptionStyle::American
                    && self.product.knock_out_settlement == KnockOutSettlement::Immediate =>
            {
                self.window.day_of(breach.step)
            }
            _ => self.schedule.settlement(),
        }
    }

    pub fn evaluate(
        &self,
        path: ArrayView1<'_, f64>,
        scale: f64,
        outcome: &BarrierOutcome,
    ) -> GrossPayoff {
        let p = self.product;
        let day = self.termination_day(outcome);

        if let Some(breach) = outcome.breach {
            let rate = match breach.side {
                BarrierSide::Upper => p.x_h,
                BarrierSide::Lower => p.x_l,
            };
            let ret = match p.payoff_basis {
                AccrualBasis::Absolute => rate,
                AccrualBasis::Annualized => rate * self.schedule.tau(day),
            };
            return GrossPayoff {
                leg: LegKind::KnockOut,
                ret,
                amount: p.notional * ret,
                day,
                basis: p.payoff_basis,
            };
        }

        let terminal = path[self.window.steps] * scale / p.start_price;
        let ret = self.exercise_return(terminal);
        GrossPayoff {
            leg: LegKind::Exercise,
            ret,
            amount: p.notional * ret,
            day,
            basis: AccrualBasis::Absolute,
        }
    }

    /// Exercise return for a terminal price expressed as a ratio of `S₀`.
    pub fn exercise_return(&self, terminal: f64) -> f64 {
        let p = self.product;
        let call = if terminal >= p.k_h {
            p.p_h * (terminal - p.k_h)
        } else {
            0.0
        };
        let put = if terminal <= p.k_l {
            p.p_l * (p.k_l - terminal)
        } else {
            0.0
        };
        match p.topology {
            BarrierTopology::UpOut => call,
            BarrierTopology::DownOut => put,
            BarrierTopology::DoubleOut => call + put,
        }
    }
}
