//! Outcome estimation without full tactical simulation
//!
//! `estimator` runs the seeded round model; `book` holds per-culture-pair
//! coefficients calibrated from real battles between battles.

pub mod book;
pub mod estimator;

pub use book::{BattleSummary, CoefficientBook, CulturePair, EMA_ALPHA};
pub use estimator::{estimate, ArmyStats, Coefficients, Estimate, Outcome};
