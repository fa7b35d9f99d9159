//! Terminal plots.

pub mod ascii;

pub use ascii::render_light_curve;
