//! # sharkfin-mc: Monte Carlo Pricing for Shark-Fin Barrier Structures
//!
//! A Rust library that prices knock-out shark-fin structures (up-out call, down-out
//! put and double-out) on simulated geometric Brownian motion paths, and reports
//! prices, per-path cash-flow breakdowns and finite-difference Greeks over a grid
//! of starting prices.
//!
//! ## Key Features
//!
//! - **Reproducible Parallelism**: seed-blocked deviates and path-ordered reductions
//!   give identical results for any thread count
//! - **Variance Reduction**: antithetic (dual-smooth) paths and quasi-random Sobol
//!   deviates
//! - **Contract Detail**: European/American observation, reverse knock-out, daily
//!   price limits, settlement extension, fees, margin and rebates
//! - **Greeks**: delta, gamma, vega, theta and rho under common random numbers
//! - **Dispatch**: synchronous and asynchronous task assignment with JSON envelopes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sharkfin_mc::config::{SharkfinConfig, SharkfinRequest};
//! use sharkfin_mc::mc::mc_engine::SharkfinPricer;
//!
//! let request = SharkfinRequest::double_sharkfin_example();
//! let config = SharkfinConfig::from_request(&request).expect("valid request");
//! let pricer = SharkfinPricer::new(config).expect("paths simulated");
//!
//! for entry in pricer.price().expect("prices").entries() {
//!     println!("{:>6.1}  {:.4}", entry.calc_price, entry.value);
//! }
//! ```
//!
//! ## Mathematical Foundation
//!
//! Paths follow the exact log step of GBM with cost of carry `b`:
//! ```text
//! S_{t+1} = S_t · exp((b − σ²/2)·dt + σ·√dt·Z)
//! ```
//! Values are averages of discounted per-path cash flows under the risk-neutral
//! measure.

pub mod analytics;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod math_utils;
pub mod mc;
pub mod models;
pub mod output;
pub mod rng;

pub use config::{SharkfinConfig, SharkfinRequest};
pub use dispatch::{Kernel, Method, Response, Tasker};
pub use error::{SharkfinError, SharkfinResult};
pub use mc::mc_engine::{ResultGrid, SharkfinPricer};
