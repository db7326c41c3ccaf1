// src/models/gbm.rs
//! Geometric Brownian motion with cost of carry, stepped exactly per trading day:
//! ```text
//! S_{t+dt} = S_t * exp((b - σ²/2) dt + σ √dt Z)
//! ```
use crate::config::MarketInputs;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gbm {
    pub carry: f64,
    pub sigma: f64,
    pub dt: f64,
    drift_dt: f64,
    vol_sqrt_dt: f64,
}

impl Gbm {
    pub fn new(carry: f64, sigma: f64, dt: f64) -> Self {
        Gbm {
            carry,
            sigma,
            dt,
            drift_dt: (carry - 0.5 * sigma * sigma) * dt,
            vol_sqrt_dt: sigma * dt.sqrt(),
        }
    }

    /// Daily dynamics for `market` on a `year_days` trading calendar.
    pub fn daily(market: &MarketInputs, year_days: usize) -> Self {
        Gbm::new(market.carry(), market.sigma, 1.0 / year_days as f64)
    }

    /// Log-return of one step driven by `normal_draw`.
    #[inline]
    pub fn log_increment(&self, normal_draw: f64) -> f64 {
        self.drift_dt + self.vol_sqrt_dt * normal_draw
    }

    #[inline]
    pub fn exact_step(&self, s_t: f64, normal_draw: f64) -> f64 {
        s_t * self.log_increment(normal_draw).exp()
    }
}
