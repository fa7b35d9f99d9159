//! Synthetic data for demos and tests.

pub mod synthetic;

pub use synthetic::{generate_demo, gaussian_skymap, DemoOptions, DEMO_TARGETS};
