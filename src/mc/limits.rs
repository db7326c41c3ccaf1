//! Daily price-limit truncation
//!
//! Exchange-traded underlyings cannot move more than a fixed fraction of the prior
//! close in one session. Each simulated log-move is capped to
//! ```text
//! [ln(1 - L), ln(1 + L)]
//! ```
//! In carry mode the part of the move that did not fit is pushed into the next
//! day's move until absorbed; in clip mode it is lost. The limiter works on
//! normalised paths, so one pass serves every starting price.

use crate::config::{LimitMode, MarketInputs};
use crate::mc::paths::PathSet;
use ndarray::parallel::prelude::*;
use ndarray::{ArrayViewMut1, Axis};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLimiter {
    ratio: f64,
    mode: LimitMode,
}

impl PriceLimiter {
    pub fn new(ratio: f64, mode: LimitMode) -> Self {
        let mode = if ratio <= 0.0 { LimitMode::None } else { mode };
        PriceLimiter { ratio, mode }
    }

    pub fn from_market(market: &MarketInputs) -> Self {
        Self::new(market.limit_ratio, market.limit_mode)
    }

    pub fn is_active(&self) -> bool {
        self.mode != LimitMode::None
    }

    /// Truncates every path of `paths` in place.
    pub fn apply(&self, paths: &mut PathSet) {
        if !self.is_active() {
            return;
        }
        paths
            .prices_mut()
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .for_each(|row| self.limit_path(row));
    }

    /// Truncates a single path in place; element 0 is left untouched.
    pub fn limit_path(&self, mut path: ArrayViewMut1<'_, f64>) {
        if !self.is_active() || path.len() < 2 {
            return;
        }
        let down = (1.0 - self.ratio).ln();
        let up = (1.0 + self.ratio).ln();

        let mut prev_raw = path[0];
        let mut pending = 0.0;
        for j in 1..path.len() {
            let raw = path[j];
            let wanted = (raw / prev_raw).ln() + pending;
            let taken = wanted.clamp(down, up);
            pending = match self.mode {
                LimitMode::Carry => wanted - taken,
                _ => 0.0,
            };
            path[j] = path[j - 1] * taken.exp();
            prev_raw = raw;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};

    fn single(path: &[f64]) -> PathSet {
        PathSet::from_prices(
            Array2::from_shape_vec((1, path.len()), path.to_vec()).expect("shape"),
        )
    }

    #[test]
    fn test_clip_discards_excess() {
        let mut paths = single(&[1.0, 1.25, 1.25, 1.30]);
        PriceLimiter::new(0.1, LimitMode::Clip).apply(&mut paths);
        let p = paths.path(0);
        assert_relative_eq!(p[1], 1.1, epsilon = 1e-12);
        assert_relative_eq!(p[2], 1.1, epsilon = 1e-12);
        assert_relative_eq!(p[3], 1.1 * 1.30 / 1.25, epsilon = 1e-12);
    }

    #[test]
    fn test_carry_catches_up() {
        let mut paths = single(&[1.0, 1.25, 1.25, 1.25]);
        PriceLimiter::new(0.1, LimitMode::Carry).apply(&mut paths);
        let p = paths.path(0);
        assert_relative_eq!(p[1], 1.1, epsilon = 1e-12);
        assert_relative_eq!(p[2], 1.21, epsilon = 1e-12);
        // Remaining excess absorbed on day three.
        assert_relative_eq!(p[3], 1.25, epsilon = 1e-12);
    }

    #[test]
    fn test_every_move_within_limit() {
        let mut paths = PathSet::from_prices(array![
            [1.0, 0.7, 0.9, 1.3, 1.31],
            [1.0, 1.0, 2.0, 0.5, 0.5]
        ]);
        let limiter = PriceLimiter::new(0.1, LimitMode::Carry);
        limiter.apply(&mut paths);
        for row in paths.prices().rows() {
            for w in row.as_slice().expect("contiguous").windows(2) {
                let m = w[1] / w[0];
                assert!(m >= 0.9 - 1e-12 && m <= 1.1 + 1e-12, "move {}", m);
            }
        }
    }

    #[test]
    fn test_zero_ratio_is_pass_through() {
        let original = single(&[1.0, 1.5, 0.4]);
        let mut paths = original.clone();
        PriceLimiter::new(0.0, LimitMode::Clip).apply(&mut paths);
        assert_eq!(paths, original);
        assert!(!PriceLimiter::new(0.0, LimitMode::Carry).is_active());
    }
}
