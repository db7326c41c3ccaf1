//! Knock-out detection
//!
//! Barrier levels are fixed at inception as ratios of `start_price`:
//! ```text
//! H_h = h_h · S₀        H_l = h_l · S₀
//! ```
//! Touching a level counts as a breach. American structures are observed on every
//! close still ahead of the valuation day (plus the valuation day's own close when
//! the market has already closed); European structures only at maturity.

use crate::config::{BarrierTopology, OptionStyle, SharkfinConfig};
use ndarray::ArrayView1;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BarrierSide {
    Upper,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Breach {
    /// Path column of the breach.
    pub step: usize,
    pub side: BarrierSide,
    pub price: f64,
    /// `true` when the knock-out happened before the valuation day.
    pub recorded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BarrierOutcome {
    pub breach: Option<Breach>,
}

impl BarrierOutcome {
    pub fn knocked_out(&self) -> bool {
        self.breach.is_some()
    }
}

/// Maps path columns of one valuation day onto trading-day indices.
///
/// Column `j` of a path is trading day `first_day + j`. Column 0 is the last known
/// close; it is only an observation when `observe_first` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationWindow {
    pub valuation_day: usize,
    pub first_day: usize,
    pub steps: usize,
    pub observe_first: bool,
}

impl ObservationWindow {
    pub fn for_day(config: &SharkfinConfig, valuation_day: usize) -> Self {
        let maturity = config.schedule.maturity();
        let first_day = (valuation_day + usize::from(config.lifecycle.market_close)).min(maturity);
        ObservationWindow {
            valuation_day,
            first_day,
            steps: maturity - first_day,
            observe_first: config.lifecycle.market_close,
        }
    }

    /// Trading-day index of path column `step`.
    pub fn day_of(&self, step: usize) -> usize {
        self.first_day + step
    }

    /// Trading-day index discounting is measured from.
    pub fn origin_day(&self) -> usize {
        self.first_day
    }
}

#[derive(Debug, Clone)]
pub struct BarrierEvaluator {
    style: OptionStyle,
    topology: BarrierTopology,
    upper: f64,
    lower: f64,
    watch_upper: bool,
    watch_lower: bool,
    recorded: Option<f64>,
    window: ObservationWindow,
}

impl BarrierEvaluator {
    pub fn new(config: &SharkfinConfig, window: ObservationWindow) -> Self {
        let product = &config.product;
        let (watch_upper, watch_lower) = match (product.topology, product.reverse_knock_out) {
            (BarrierTopology::UpOut, false) | (BarrierTopology::DownOut, true) => (true, false),
            (BarrierTopology::DownOut, false) | (BarrierTopology::UpOut, true) => (false, true),
            (BarrierTopology::DoubleOut, _) => (true, true),
        };
        BarrierEvaluator {
            style: product.style,
            topology: product.topology,
            upper: config.upper_barrier(),
            lower: config.lower_barrier(),
            watch_upper,
            watch_lower,
            recorded: config.lifecycle.knocked_out_at,
            window,
        }
    }

    pub fn window(&self) -> ObservationWindow {
        self.window
    }

    /// Side breached by `price`, if any, among the barriers this structure watches.
    #[inline]
    pub fn classify(&self, price: f64) -> Option<BarrierSide> {
        if self.watch_upper && price >= self.upper {
            Some(BarrierSide::Upper)
        } else if self.watch_lower && price <= self.lower {
            Some(BarrierSide::Lower)
        } else {
            None
        }
    }

    /// Scans a normalised path scaled by `scale`.
    pub fn evaluate(&self, path: ArrayView1<'_, f64>, scale: f64) -> BarrierOutcome {
        if let Some(point) = self.recorded {
            return BarrierOutcome {
                breach: Some(Breach {
                    step: 0,
                    side: self.recorded_side(point),
                    price: point,
                    recorded: true,
                }),
            };
        }

        let last = self.window.steps;
        let first = match self.style {
            OptionStyle::European => last,
            OptionStyle::American if self.window.observe_first => 0,
            OptionStyle::American => 1.min(last),
        };
        let breach = (first..=last).find_map(|step| {
            let price = path[step] * scale;
            self.classify(price).map(|side| Breach {
                step,
                side,
                price,
                recorded: false,
            })
        });
        BarrierOutcome { breach }
    }

    /// Single-barrier structures knock out on their watched side; the recorded point
    /// only picks the side of a double-out.
    fn recorded_side(&self, point: f64) -> BarrierSide {
        match self.topology {
            BarrierTopology::DoubleOut if point >= self.upper => BarrierSide::Upper,
            BarrierTopology::DoubleOut if point <= self.lower => BarrierSide::Lower,
            BarrierTopology::DoubleOut => {
                if self.upper - point <= point - self.lower {
                    BarrierSide::Upper
                } else {
                    BarrierSide::Lower
                }
            }
            _ if self.watch_upper => BarrierSide::Upper,
            _ => BarrierSide::Lower,
        }
    }
}
