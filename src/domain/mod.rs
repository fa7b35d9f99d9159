//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - collaborator records (`Target`, `Localization`, `PhotometryPoint`, ...)
//! - derived records (`HostGalaxyCandidate`, `LightCurveFit`)
//! - candidate state (`Candidate`, `FactorValue`, factor `keys`)
//! - run configuration (`VetConfig`)

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;
