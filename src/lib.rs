//! `kn-vet` library crate.
//!
//! Scores optical transient candidates as counterparts of a gravitational-wave
//! event. The binary (`vet`) is a thin wrapper around this library so that:
//!
//! - the vetting stages are testable without spawning processes
//! - stores and catalogs can be swapped for a database or live services
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod catalog;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod sky;
pub mod store;
pub mod vetting;
