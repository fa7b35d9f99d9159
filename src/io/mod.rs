//! Input/output helpers.
//!
//! - photometry CSV ingest + validation (`ingest`)
//! - scenario JSON bundles (`scenario`)
//! - result exports (CSV/JSON) (`export`)

pub mod export;
pub mod ingest;
pub mod scenario;

pub use export::*;
pub use ingest::*;
pub use scenario::*;
