//! Finite-difference Greeks
//!
//! Every bump reuses the deviates of the base run (common random numbers), so the
//! difference quotients see the same Brownian paths.
//!
//! | greek | bump | formula |
//! |---|---|---|
//! | delta | `S · (1 ± 1%)` | `(V₊ − V₋) / 2h` |
//! | gamma | `S · (1 ± 1%)` | `(V₊ − 2V₀ + V₋) / h²` |
//! | vega | `σ ± 0.01` | `(V₊ − V₋) / 2h × 0.01`, per vol point |
//! | theta | valuation day ± 1 | `(V(d+1) − V(d−1)) / 2`, per trading day |
//! | rho | `r ± 1bp` | `(V₊ − V₋) / 2h × 0.01`, per 1% rate |
//!
//! Vega falls back to a forward difference when `σ < 0.01`; theta uses a forward
//! difference on day 0 and a backward one on the last tradable day.

use crate::config::Greek;
use crate::error::SharkfinResult;
use crate::mc::mc_engine::{ResultGrid, SharkfinPricer};
use bitflags::bitflags;
use std::ops::Range;

pub const SPOT_BUMP: f64 = 0.01;
pub const VOL_BUMP: f64 = 0.01;
pub const RATE_BUMP: f64 = 1e-4;
/// Vega and rho are reported per 1% move.
pub const PERCENT: f64 = 0.01;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GreeksConfig: u32 {
        const NONE  = 0;
        const DELTA = 1 << 0;
        const GAMMA = 1 << 1;
        const VEGA  = 1 << 2;
        const THETA = 1 << 3;
        const RHO   = 1 << 4;
    }
}

impl GreeksConfig {
    /// Selected Greeks in `Greek::ALL` order.
    pub fn greeks(self) -> Vec<Greek> {
        Greek::ALL
            .iter()
            .copied()
            .filter(|&g| self.contains(GreeksConfig::from(g)))
            .collect()
    }
}

impl From<Greek> for GreeksConfig {
    fn from(greek: Greek) -> Self {
        match greek {
            Greek::Delta => GreeksConfig::DELTA,
            Greek::Gamma => GreeksConfig::GAMMA,
            Greek::Vega => GreeksConfig::VEGA,
            Greek::Theta => GreeksConfig::THETA,
            Greek::Rho => GreeksConfig::RHO,
        }
    }
}

/// Re-prices a base [`SharkfinPricer`] under bumped inputs.
pub struct SensitivityEngine<'a> {
    base: &'a SharkfinPricer,
}

impl<'a> SensitivityEngine<'a> {
    pub fn new(base: &'a SharkfinPricer) -> Self {
        SensitivityEngine { base }
    }

    /// Greek at every starting price on the valuation day.
    pub fn grid(&self, greek: Greek) -> SharkfinResult<ResultGrid<f64>> {
        let day = self.base.config().grid.run_from;
        Ok(self
            .values(greek, day..day + 1)?
            .map(|row| row.first().copied().unwrap_or(f64::NAN)))
    }

    /// Greek at every starting price for each day of the run window.
    pub fn surface(&self, greek: Greek) -> SharkfinResult<ResultGrid<Vec<f64>>> {
        self.values(greek, self.base.config().grid.days())
    }

    /// One surface per selected Greek.
    pub fn surfaces(
        &self,
        selection: GreeksConfig,
    ) -> SharkfinResult<Vec<(Greek, ResultGrid<Vec<f64>>)>> {
        selection
            .greeks()
            .into_iter()
            .map(|g| Ok((g, self.surface(g)?)))
            .collect()
    }

    fn values(&self, greek: Greek, days: Range<usize>) -> SharkfinResult<ResultGrid<Vec<f64>>> {
        tracing::info!(greek = greek.name(), days = days.len(), "computing greek");
        let base = self.base;
        let config = base.config();

        let mut grid = ResultGrid::new();
        match greek {
            Greek::Delta | Greek::Gamma => {
                for &s in &config.grid.calc_price {
                    let h = SPOT_BUMP * s;
                    let row = days
                        .clone()
                        .map(|day| {
                            let up = base.value_at(s + h, day)?;
                            let down = base.value_at(s - h, day)?;
                            Ok(if greek == Greek::Delta {
                                (up - down) / (2.0 * h)
                            } else {
                                let mid = base.value_at(s, day)?;
                                (up - 2.0 * mid + down) / (h * h)
                            })
                        })
                        .collect::<SharkfinResult<Vec<f64>>>()?;
                    grid.push(s, row);
                }
            }
            Greek::Vega => {
                let sigma = config.market.sigma;
                let up = base.bumped(|m| m.sigma = sigma + VOL_BUMP)?;
                let down = if sigma >= VOL_BUMP {
                    Some(base.bumped(|m| m.sigma = sigma - VOL_BUMP)?)
                } else {
                    None
                };
                self.bumped_difference(&mut grid, days, &up, down.as_ref(), VOL_BUMP)?;
            }
            Greek::Rho => {
                let r = config.market.risk_free_rate;
                let up = base.bumped(|m| m.risk_free_rate = r + RATE_BUMP)?;
                let down = base.bumped(|m| m.risk_free_rate = r - RATE_BUMP)?;
                self.bumped_difference(&mut grid, days, &up, Some(&down), RATE_BUMP)?;
            }
            Greek::Theta => {
                let last = config.schedule.maturity() - 1;
                for &s in &config.grid.calc_price {
                    let row = days
                        .clone()
                        .map(|day| {
                            if last == 0 {
                                return Ok(0.0);
                            }
                            Ok(if day == 0 {
                                base.value_at(s, 1)? - base.value_at(s, 0)?
                            } else if day >= last {
                                base.value_at(s, last)? - base.value_at(s, last - 1)?
                            } else {
                                (base.value_at(s, day + 1)? - base.value_at(s, day - 1)?) / 2.0
                            })
                        })
                        .collect::<SharkfinResult<Vec<f64>>>()?;
                    grid.push(s, row);
                }
            }
        }
        Ok(grid)
    }

    /// Central difference between two re-simulated pricers scaled per 1%, or a
    /// forward difference against the base when `down` is absent.
    fn bumped_difference(
        &self,
        grid: &mut ResultGrid<Vec<f64>>,
        days: Range<usize>,
        up: &SharkfinPricer,
        down: Option<&SharkfinPricer>,
        h: f64,
    ) -> SharkfinResult<()> {
        for &s in &self.base.config().grid.calc_price {
            let row = days
                .clone()
                .map(|day| {
                    let v_up = up.value_at(s, day)?;
                    Ok(match down {
                        Some(down) => (v_up - down.value_at(s, day)?) / (2.0 * h) * PERCENT,
                        None => (v_up - self.base.value_at(s, day)?) / h * PERCENT,
                    })
                })
                .collect::<SharkfinResult<Vec<f64>>>()?;
            grid.push(s, row);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeks_config_selection_order() {
        let sel = GreeksConfig::RHO | GreeksConfig::DELTA | GreeksConfig::THETA;
        assert_eq!(sel.greeks(), vec![Greek::Delta, Greek::Theta, Greek::Rho]);
        assert!(GreeksConfig::NONE.greeks().is_empty());
        assert_eq!(GreeksConfig::from(Greek::Vega), GreeksConfig::VEGA);
    }
}
