//! Path generation
//!
//! Paths are simulated once per market-parameter set, normalised so every path
//! starts at 1.0. Multiplying by a starting price gives the actual trajectory, which
//! lets one `PathSet` serve the whole starting-price grid. Column `j` is the close
//! after `j` simulated trading days.

use crate::config::SharkfinConfig;
use crate::error::{SharkfinError, SharkfinResult};
use crate::mc::limits::PriceLimiter;
use crate::models::gbm::Gbm;
use crate::rng::DeviateMatrix;
use ndarray::parallel::prelude::*;
use ndarray::{Array2, ArrayView1, Axis};

/// Simulated price grid of shape `(runs, steps + 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSet {
    prices: Array2<f64>,
}

impl PathSet {
    /// Wraps an explicit price grid; column 0 is the starting point.
    pub fn from_prices(prices: Array2<f64>) -> Self {
        PathSet { prices }
    }

    pub fn runs(&self) -> usize {
        self.prices.nrows()
    }

    pub fn steps(&self) -> usize {
        self.prices.ncols().saturating_sub(1)
    }

    pub fn path(&self, run: usize) -> ArrayView1<'_, f64> {
        self.prices.row(run)
    }

    pub fn prices(&self) -> &Array2<f64> {
        &self.prices
    }

    pub(crate) fn prices_mut(&mut self) -> &mut Array2<f64> {
        &mut self.prices
    }
}

/// Builds `PathSet`s from a configuration.
pub struct PathGenerator<'a> {
    config: &'a SharkfinConfig,
}

impl<'a> PathGenerator<'a> {
    pub fn new(config: &'a SharkfinConfig) -> Self {
        PathGenerator { config }
    }

    /// Draws the deviates for this configuration's seed set.
    pub fn deviates(&self) -> SharkfinResult<DeviateMatrix> {
        DeviateMatrix::generate(&self.config.simulation)
    }

    /// Deviates plus limited paths in one call.
    pub fn generate(&self) -> SharkfinResult<PathSet> {
        let deviates = self.deviates()?;
        self.paths(&deviates)
    }

    /// Simulates paths from `deviates` and applies the daily price limit.
    ///
    /// Reusing the same `deviates` with different market inputs gives common random
    /// numbers across re-pricings.
    pub fn paths(&self, deviates: &DeviateMatrix) -> SharkfinResult<PathSet> {
        let mut paths = self.raw_paths(deviates)?;
        PriceLimiter::from_market(&self.config.market).apply(&mut paths);
        Ok(paths)
    }

    /// Simulated paths before price-limit truncation.
    pub fn raw_paths(&self, deviates: &DeviateMatrix) -> SharkfinResult<PathSet> {
        let sim = &self.config.simulation;
        let (rows, cols) = deviates.shape();
        if deviates.dual_smooth() != sim.dual_smooth
            || rows < sim.rows_needed()
            || cols < sim.runs_step
        {
            return Err(SharkfinError::invalid_config(
                "rand_rows/rand_cols",
                format!(
                    "deviate matrix {}x{} does not cover {} paths of {} steps",
                    rows, cols, sim.runs_size, sim.runs_step
                ),
            ));
        }

        let gbm = Gbm::daily(&self.config.market, sim.year_days);
        let steps = sim.runs_step;
        let mut prices = Array2::<f64>::zeros((sim.runs_size, steps + 1));

        prices
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(run, mut row)| {
                let mut s = 1.0;
                row[0] = s;
                for step in 0..steps {
                    s = gbm.exact_step(s, deviates.draw(run, step));
                    row[step + 1] = s;
                }
            });

        tracing::debug!(
            runs = sim.runs_size,
            steps,
            sigma = self.config.market.sigma,
            "simulated path set"
        );
        Ok(PathSet { prices })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SharkfinRequest;

    fn small_config(dual_smooth: bool) -> SharkfinConfig {
        let request = SharkfinRequest {
            rand_rows: 0,
            rand_cols: 0,
            rand_seed: vec![1, 2, 3],
            runs_size: 500,
            runs_step: 20,
            dual_smooth,
            calc_price: vec![100.0],
            ..SharkfinRequest::double_sharkfin_example()
        };
        SharkfinConfig::from_request(&request).expect("valid")
    }

    #[test]
    fn test_paths_are_deterministic() {
        let cfg = small_config(true);
        let a = PathGenerator::new(&cfg).generate().expect("paths");
        let b = PathGenerator::new(&cfg).generate().expect("paths");
        assert_eq!(a, b);
        assert_eq!(a.runs(), 500);
        assert_eq!(a.steps(), 20);
    }

    #[test]
    fn test_paths_start_normalised() {
        let cfg = small_config(false);
        let paths = PathGenerator::new(&cfg).generate().expect("paths");
        assert!(paths.prices().column(0).iter().all(|&p| p == 1.0));
        assert!(paths.prices().iter().all(|&p| p > 0.0 && p.is_finite()));
    }

    #[test]
    fn test_antithetic_log_returns_mirror() {
        let cfg = small_config(true);
        let paths = PathGenerator::new(&cfg).generate().expect("paths");
        let gbm = Gbm::daily(&cfg.market, cfg.simulation.year_days);
        let drift = gbm.log_increment(0.0);
        for pair in 0..250 {
            let a = paths.path(2 * pair);
            let b = paths.path(2 * pair + 1);
            for step in 1..=20 {
                let ra = (a[step] / a[step - 1]).ln() - drift;
                let rb = (b[step] / b[step - 1]).ln() - drift;
                assert!((ra + rb).abs() < 1e-12, "pair {} step {}", pair, step);
            }
        }
    }

    #[test]
    fn test_foreign_deviates_must_cover_config() {
        let cfg = small_config(true);
        let other = small_config(false);
        let deviates = PathGenerator::new(&cfg).deviates().expect("deviates");
        assert!(PathGenerator::new(&other).paths(&deviates).is_err());
    }
}
