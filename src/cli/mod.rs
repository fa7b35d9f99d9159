//! Command-line parsing for the `vet` binary.
//!
//! Argument parsing and command dispatch stay separate from the vetting code;
//! `app::vet_config_from_args` turns the parsed flags into a `VetConfig`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "vet", version, about = "Score transient candidates against a GW event")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Vet the candidates of a scenario and print a full report for each.
    Score(ScoreArgs),
    /// Vet every candidate of a scenario in parallel and print a ranked table.
    Batch(ScoreArgs),
    /// Generate a seeded synthetic scenario and vet it.
    Demo(DemoArgs),
}

/// Options for scoring a scenario file.
#[derive(Debug, Args, Clone)]
pub struct ScoreArgs {
    /// Scenario JSON file.
    #[arg(long, value_name = "JSON")]
    pub scenario: PathBuf,

    /// Only vet the candidate with this target name.
    #[arg(long)]
    pub target: Option<String>,

    /// Extra photometry CSV merged into the scenario.
    #[arg(long, value_name = "CSV")]
    pub photometry: Option<PathBuf>,

    #[command(flatten)]
    pub vet: VetArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Options for the synthetic demo.
#[derive(Debug, Args, Clone)]
pub struct DemoArgs {
    /// Random seed for the generated scenario.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// 1σ radius of the generated skymap (deg).
    #[arg(long, default_value_t = 2.0)]
    pub skymap_sigma: f64,

    /// Photometric scatter of the generated light curves (mag).
    #[arg(long, default_value_t = 0.03)]
    pub noise: f64,

    /// Save the generated scenario to this file.
    #[arg(long, value_name = "JSON")]
    pub write_scenario: Option<PathBuf>,

    #[command(flatten)]
    pub vet: VetArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Vetting thresholds. Every flag defaults to the library default.
#[derive(Debug, Args, Clone)]
pub struct VetArgs {
    /// Skymap scores below this end the run with priority 0.
    #[arg(long, env = "KNVET_SKYMAP_THRESHOLD", default_value_t = 0.01)]
    pub skymap_threshold: f64,

    /// Multiplier applied for each piece of evidence against a candidate.
    #[arg(long, env = "KNVET_PENALTY", default_value_t = 0.1)]
    pub penalty: f64,

    /// Point-source match radius (arcsec).
    #[arg(long, default_value_t = 2.0)]
    pub point_source_radius: f64,

    /// Host-galaxy search radius (arcmin).
    #[arg(long, default_value_t = 5.0)]
    pub host_radius: f64,

    /// PCC ceiling for host candidates (relaxed to the minimum PCC present).
    #[arg(long, default_value_t = 0.1)]
    pub pcc_threshold: f64,

    /// Discard hosts with a known redshift below this.
    #[arg(long, default_value_t = 0.02)]
    pub min_host_redshift: f64,

    /// Photometric filters to consider, most preferred first.
    #[arg(long, value_delimiter = ',')]
    pub filters: Option<Vec<String>>,

    /// Use the raw peak flux instead of inflating it by 3σ.
    #[arg(long)]
    pub no_inflate: bool,

    /// Upper edge of the allowed peak luminosity (erg/s).
    #[arg(long, default_value_t = 1e43)]
    pub luminosity_max: f64,

    /// Latest allowed time of maximum (days after the event).
    #[arg(long, default_value_t = 4.0)]
    pub peak_time_max: f64,

    /// Minimum post-peak fade rate (mag/day).
    #[arg(long, default_value_t = 0.3)]
    pub min_decay_rate: f64,

    /// Half-width of the pre-discovery window (days).
    #[arg(long, default_value_t = 10.0)]
    pub predetection_window: f64,

    /// Pre-discovery detections in one window that trigger the penalty.
    #[arg(long, default_value_t = 3)]
    pub predetection_max: usize,

    /// Minor-planet match radius (arcsec).
    #[arg(long, default_value_t = 30.0)]
    pub minor_planet_radius: f64,

    /// Hubble constant (km/s/Mpc).
    #[arg(long, default_value_t = 67.66)]
    pub h0: f64,

    /// Matter density parameter.
    #[arg(long, default_value_t = 0.30966)]
    pub omega_m: f64,
}

/// Presentation and export options.
#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Disable the terminal light-curve plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 16)]
    pub height: usize,

    /// Export results (factors + hosts) to JSON.
    #[arg(long, value_name = "JSON")]
    pub export_json: Option<PathBuf>,

    /// Export one row of factors per candidate to CSV.
    #[arg(long, value_name = "CSV")]
    pub export_csv: Option<PathBuf>,
}
