// src/mc/mc_engine.rs
use crate::config::{MarketInputs, SharkfinConfig};
use crate::error::{SharkfinError, SharkfinResult};
use crate::mc::barrier::{BarrierEvaluator, ObservationWindow};
use crate::mc::cashflow::{CashflowAggregator, PathCashflows, PayoffBreakdown};
use crate::mc::greeks::SensitivityEngine;
use crate::mc::paths::{PathGenerator, PathSet};
use crate::mc::payoffs::PayoffEvaluator;
use crate::rng::DeviateMatrix;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;

pub use crate::config::Greek;
pub use crate::mc::cashflow::ValuationMode;

/// Monte Carlo estimate with its standard error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Estimate {
    pub mean: f64,
    pub std_error: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridEntry<T> {
    pub calc_price: f64,
    pub value: T,
}

/// Results keyed by starting price, in the order the prices were requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultGrid<T> {
    entries: Vec<GridEntry<T>>,
}

impl<T> ResultGrid<T> {
    pub fn new() -> Self {
        ResultGrid {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, calc_price: f64, value: T) {
        self.entries.push(GridEntry { calc_price, value });
    }

    pub fn entries(&self) -> &[GridEntry<T>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|e| &e.value)
    }

    /// Value at an exact requested starting price.
    pub fn get(&self, calc_price: f64) -> Option<&T> {
        self.entries
            .iter()
            .find(|e| e.calc_price == calc_price)
            .map(|e| &e.value)
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> ResultGrid<U> {
        ResultGrid {
            entries: self
                .entries
                .into_iter()
                .map(|e| GridEntry {
                    calc_price: e.calc_price,
                    value: f(e.value),
                })
                .collect(),
        }
    }
}

impl<T> Default for ResultGrid<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize> ResultGrid<T> {
    pub fn to_json(&self) -> SharkfinResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Barrier, payoff and cash-flow stages bound to one valuation day.
struct DayPipeline<'a> {
    barrier: BarrierEvaluator,
    payoff: PayoffEvaluator<'a>,
    cashflow: CashflowAggregator<'a>,
}

impl<'a> DayPipeline<'a> {
    fn new(config: &'a SharkfinConfig, day: usize, mode: ValuationMode) -> Self {
        let window = ObservationWindow::for_day(config, day);
        DayPipeline {
            barrier: BarrierEvaluator::new(config, window),
            payoff: PayoffEvaluator::new(config, window),
            cashflow: CashflowAggregator::new(config, window, mode),
        }
    }

    fn net(&self, paths: &PathSet, run: usize, scale: f64) -> f64 {
        let path = paths.path(run);
        let outcome = self.barrier.evaluate(path, scale);
        let gross = self.payoff.evaluate(path, scale, &outcome);
        let termination = self.payoff.termination_day(&outcome);
        self.cashflow.net(&gross, termination)
    }

    fn itemise(&self, paths: &PathSet, run: usize, scale: f64) -> PathCashflows {
        let path = paths.path(run);
        let outcome = self.barrier.evaluate(path, scale);
        let gross = self.payoff.evaluate(path, scale, &outcome);
        let termination = self.payoff.termination_day(&outcome);
        self.cashflow.path_cashflows(outcome, &gross, termination)
    }
}

/// Monte Carlo engine for one shark-fin configuration.
///
/// # Pipeline
///
/// ```text
/// deviates → normalised paths → price limit → barrier → payoff → cash-flow legs
/// ```
///
/// Paths are simulated once, normalised to 1.0, and reused for every starting price
/// and every valuation day: day `v` reads the first `runs_step − v` steps (one fewer
/// when the market has closed). The limiter only looks backwards, so every prefix of a
/// limited path is itself a valid limited path.
///
/// # Reduction order
///
/// Per-path values are produced in parallel but collected in path order and summed
/// sequentially, so results do not depend on the thread count.
///
/// # Standard error
///
/// With dual-smooth on, each antithetic pair is averaged first and the error is
/// taken over pair means; an unpaired last path counts as its own sample.
pub struct SharkfinPricer {
    config: SharkfinConfig,
    deviates: Arc<DeviateMatrix>,
    paths: PathSet,
}

impl SharkfinPricer {
    /// Draws deviates and simulates paths for `config`.
    pub fn new(config: SharkfinConfig) -> SharkfinResult<Self> {
        let deviates = Arc::new(PathGenerator::new(&config).deviates()?);
        Self::with_deviates(config, deviates)
    }

    /// Simulates paths for `config` from existing deviates.
    pub fn with_deviates(
        config: SharkfinConfig,
        deviates: Arc<DeviateMatrix>,
    ) -> SharkfinResult<Self> {
        let paths = PathGenerator::new(&config).paths(&deviates)?;
        Ok(SharkfinPricer {
            config,
            deviates,
            paths,
        })
    }

    /// Re-simulates under adjusted market inputs with the same deviates.
    pub fn bumped(&self, adjust: impl FnOnce(&mut MarketInputs)) -> SharkfinResult<Self> {
        let mut config = self.config.clone();
        adjust(&mut config.market);
        Self::with_deviates(config, Arc::clone(&self.deviates))
    }

    pub fn config(&self) -> &SharkfinConfig {
        &self.config
    }

    pub fn deviates(&self) -> &Arc<DeviateMatrix> {
        &self.deviates
    }

    pub fn paths(&self) -> &PathSet {
        &self.paths
    }

    /// Net present value of every path, in path order.
    pub fn path_values(
        &self,
        calc_price: f64,
        day: usize,
        mode: ValuationMode,
    ) -> SharkfinResult<Vec<f64>> {
        self.check_day(day)?;
        let pipeline = DayPipeline::new(&self.config, day, mode);
        Ok((0..self.paths.runs())
            .into_par_iter()
            .map(|run| pipeline.net(&self.paths, run, calc_price))
            .collect())
    }

    /// Price-mode estimate at one starting price and valuation day.
    pub fn estimate_at(&self, calc_price: f64, day: usize) -> SharkfinResult<Estimate> {
        let values = self.path_values(calc_price, day, ValuationMode::Price)?;
        let estimate = estimate(&values, self.config.simulation.dual_smooth);
        check_finite("price", estimate.mean)?;
        check_finite("price", estimate.std_error)?;
        Ok(estimate)
    }

    /// Price-mode value at one starting price and valuation day.
    pub fn value_at(&self, calc_price: f64, day: usize) -> SharkfinResult<f64> {
        let values = self.path_values(calc_price, day, ValuationMode::Price)?;
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        check_finite("price", mean)?;
        Ok(mean)
    }

    pub fn price(&self) -> SharkfinResult<ResultGrid<f64>> {
        Ok(self.price_estimates()?.map(|e| e.mean))
    }

    pub fn price_estimates(&self) -> SharkfinResult<ResultGrid<Estimate>> {
        let day = self.config.grid.run_from;
        tracing::info!(
            prices = self.config.grid.calc_price.len(),
            runs = self.paths.runs(),
            day,
            "pricing shark-fin grid"
        );
        let mut grid = ResultGrid::new();
        for &calc_price in &self.config.grid.calc_price {
            let estimate = self.estimate_at(calc_price, day)?;
            tracing::debug!(
                calc_price,
                mean = estimate.mean,
                std_error = estimate.std_error,
                "priced"
            );
            grid.push(calc_price, estimate);
        }
        Ok(grid)
    }

    /// Itemised cash flows of every path at every starting price.
    pub fn payoff(&self) -> SharkfinResult<ResultGrid<PayoffBreakdown>> {
        let day = self.config.grid.run_from;
        self.check_day(day)?;
        tracing::info!(
            prices = self.config.grid.calc_price.len(),
            runs = self.paths.runs(),
            day,
            "building payoff breakdown"
        );
        let pipeline = DayPipeline::new(&self.config, day, ValuationMode::Payoff);
        let mut grid = ResultGrid::new();
        for &calc_price in &self.config.grid.calc_price {
            let paths: Vec<PathCashflows> = (0..self.paths.runs())
                .into_par_iter()
                .map(|run| pipeline.itemise(&self.paths, run, calc_price))
                .collect();
            let breakdown = PayoffBreakdown { paths };
            check_finite("payoff", breakdown.mean_net())?;
            grid.push(calc_price, breakdown);
        }
        Ok(grid)
    }

    /// Price at every starting price for each day of the run window.
    pub fn price_surface(&self) -> SharkfinResult<ResultGrid<Vec<f64>>> {
        tracing::info!(
            prices = self.config.grid.calc_price.len(),
            days = self.config.grid.run_days,
            "pricing run-window surface"
        );
        self.mean_surface(ValuationMode::Price, "price")
    }

    /// Mean net payoff, all legs included, at every starting price for each day of
    /// the run window.
    pub fn payoff_surface(&self) -> SharkfinResult<ResultGrid<Vec<f64>>> {
        tracing::info!(
            prices = self.config.grid.calc_price.len(),
            days = self.config.grid.run_days,
            "building run-window payoff surface"
        );
        self.mean_surface(ValuationMode::Payoff, "payoff")
    }

    fn mean_surface(
        &self,
        mode: ValuationMode,
        what: &str,
    ) -> SharkfinResult<ResultGrid<Vec<f64>>> {
        let mut grid = ResultGrid::new();
        for &calc_price in &self.config.grid.calc_price {
            let row = self
                .config
                .grid
                .days()
                .map(|day| -> SharkfinResult<f64> {
                    let values = self.path_values(calc_price, day, mode)?;
                    let mean = values.iter().sum::<f64>() / values.len() as f64;
                    check_finite(what, mean)?;
                    Ok(mean)
                })
                .collect::<SharkfinResult<Vec<f64>>>()?;
            grid.push(calc_price, row);
        }
        Ok(grid)
    }

    pub fn greeks(&self, greek: Greek) -> SharkfinResult<ResultGrid<f64>> {
        SensitivityEngine::new(self).grid(greek)
    }

    pub fn greek_surface(&self, greek: Greek) -> SharkfinResult<ResultGrid<Vec<f64>>> {
        SensitivityEngine::new(self).surface(greek)
    }

    fn check_day(&self, day: usize) -> SharkfinResult<()> {
        if day >= self.config.schedule.maturity() {
            return Err(SharkfinError::invalid_config(
                "run_from",
                format!(
                    "valuation day {} is not before maturity day {}",
                    day,
                    self.config.schedule.maturity()
                ),
            ));
        }
        Ok(())
    }
}

/// Mean and standard error of per-path values.
pub fn estimate(values: &[f64], dual_smooth: bool) -> Estimate {
    let n = values.len();
    if n == 0 {
        return Estimate {
            mean: f64::NAN,
            std_error: f64::NAN,
        };
    }
    let mean = values.iter().sum::<f64>() / n as f64;

    let samples: Vec<f64> = if dual_smooth {
        values
            .chunks(2)
            .map(|pair| pair.iter().sum::<f64>() / pair.len() as f64)
            .collect()
    } else {
        values.to_vec()
    };
    let m = samples.len();
    let std_error = if m > 1 {
        let sample_mean = samples.iter().sum::<f64>() / m as f64;
        let variance = samples
            .iter()
            .map(|x| (x - sample_mean).powi(2))
            .sum::<f64>()
            / (m as f64 - 1.0);
        (variance / m as f64).sqrt()
    } else {
        0.0
    };

    Estimate { mean, std_error }
}

pub(crate) fn check_finite(method: &str, value: f64) -> SharkfinResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SharkfinError::NumericDegenerate {
            method: method.to_string(),
            reason: format!("estimate is not finite: {}", value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SharkfinRequest;
    use approx::assert_relative_eq;

    fn small(adjust: impl FnOnce(&mut SharkfinRequest)) -> SharkfinPricer {
        let mut request = SharkfinRequest {
            rand_rows: 0,
            rand_cols: 0,
            rand_seed: vec![17, 18],
            runs_size: 2_000,
            runs_step: 20,
            calc_price: vec![95.0, 100.0, 105.0],
            ..SharkfinRequest::double_sharkfin_example()
        };
        adjust(&mut request);
        let config = SharkfinConfig::from_request(&request).expect("valid");
        SharkfinPricer::new(config).expect("pricer")
    }

    #[test]
    fn test_estimate_statistics() {
        let e = estimate(&[1.0, 3.0, 5.0, 7.0], false);
        assert_relative_eq!(e.mean, 4.0, epsilon = 1e-12);
        // Sample sd = sqrt(20/3)
        assert_relative_eq!(e.std_error, (20.0f64 / 3.0).sqrt() / 2.0, epsilon = 1e-12);

        let paired = estimate(&[1.0, 3.0, 5.0, 7.0], true);
        assert_relative_eq!(paired.mean, 4.0, epsilon = 1e-12);
        // Pair means 2 and 6.
        assert_relative_eq!(paired.std_error, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_grid_keeps_request_order() {
        let pricer = small(|_| {});
        let grid = pricer.price().expect("prices");
        let order: Vec<f64> = grid.entries().iter().map(|e| e.calc_price).collect();
        assert_eq!(order, vec![95.0, 100.0, 105.0]);
        assert!(grid.values().all(|v| v.is_finite()));
    }

    #[test]
    fn test_price_matches_value_at() {
        let pricer = small(|_| {});
        let grid = pricer.price().expect("prices");
        let direct = pricer.value_at(100.0, 0).expect("value");
        assert_relative_eq!(*grid.get(100.0).expect("entry"), direct, epsilon = 1e-12);
    }

    #[test]
    fn test_payoff_net_matches_path_values_without_fees() {
        let pricer = small(|r| {
            r.option_fee = 0.0;
            r.discount_payoff = true;
        });
        let payoff = pricer.payoff().expect("payoff");
        let breakdown = payoff.get(100.0).expect("entry");
        assert_eq!(breakdown.paths.len(), 2_000);
        let price = pricer.value_at(100.0, 0).expect("value");
        assert_relative_eq!(breakdown.mean_net(), price, epsilon = 1e-9);
    }

    #[test]
    fn test_result_grid_json_is_ordered_list() {
        let mut grid = ResultGrid::new();
        grid.push(100.0, 1.5);
        grid.push(90.0, 2.5);
        let json = grid.to_json().expect("json");
        assert_eq!(
            json,
            r#"[{"calc_price":100.0,"value":1.5},{"calc_price":90.0,"value":2.5}]"#
        );
    }

    #[test]
    fn test_day_past_maturity_rejected() {
        let pricer = small(|_| {});
        assert!(pricer.value_at(100.0, 20).is_err());
    }
}
