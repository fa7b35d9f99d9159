//! Mathematical utilities: least squares, gridded densities, cosmology and
//! synthetic photometry.

pub mod cosmology;
pub mod ols;
pub mod photometry;
pub mod stats;

pub use ols::*;
pub use stats::*;
