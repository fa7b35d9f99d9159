//! Light-curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - generate start grids for the broken power law
//! - refine each start (parallel) with bounded least squares
//! - select the best model using AICc + guardrails

pub mod fitter;
pub mod selection;
pub mod start_grid;

pub use fitter::*;
pub use selection::*;
pub use start_grid::*;
