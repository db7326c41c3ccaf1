pub mod barrier;
pub mod cashflow;
pub mod greeks;
pub mod limits;
pub mod mc_engine;
pub mod paths;
pub mod payoffs;
