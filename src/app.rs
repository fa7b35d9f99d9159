//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - loads (or generates) a scenario
//! - vets its candidates
//! - prints reports and plots
//! - writes optional exports

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, DemoArgs, OutputArgs, ScoreArgs, VetArgs};
use crate::data::{DemoOptions, generate_demo};
use crate::domain::VetConfig;
use crate::error::AppError;
use crate::io::{
    LoadedScenario, export_records, write_factors_csv, write_results_json, write_scenario_file,
};
use crate::math::cosmology::Cosmology;

pub mod pipeline;

use pipeline::RunResults;

/// Entry point for the `vet` binary.
pub fn run() -> Result<(), AppError> {
    init_tracing();
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Score(args) => handle_score(args, OutputMode::Full),
        Command::Batch(args) => handle_score(args, OutputMode::TableOnly),
        Command::Demo(args) => handle_demo(args),
    }
}

/// Logs go to stderr so reports on stdout stay clean; `RUST_LOG` overrides
/// the default level.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Full,
    TableOnly,
}

fn handle_score(args: ScoreArgs, mode: OutputMode) -> Result<(), AppError> {
    let config = vet_config_from_args(&args.vet);
    let loaded = pipeline::load_scenario(&args.scenario, args.photometry.as_deref())?;
    let results = pipeline::run_candidates(&loaded, &config, args.target.as_deref())?;

    present(&results, &config, &args.output, mode)?;
    pipeline::run_status(&results)
}

fn handle_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = vet_config_from_args(&args.vet);
    let options = DemoOptions {
        seed: args.seed,
        skymap_sigma_deg: args.skymap_sigma,
        noise_mag: args.noise,
        ..DemoOptions::default()
    };
    let scenario = generate_demo(&options)?;
    if let Some(path) = &args.write_scenario {
        write_scenario_file(path, &scenario)?;
        info!(path = %path.display(), "wrote demo scenario");
    }

    let loaded: LoadedScenario = scenario.load()?;
    let results = pipeline::run_candidates(&loaded, &config, None)?;

    present(&results, &config, &args.output, OutputMode::TableOnly)?;
    print_reports(&results, &config, &args.output);
    pipeline::run_status(&results)
}

fn present(
    results: &RunResults,
    config: &VetConfig,
    output: &OutputArgs,
    mode: OutputMode,
) -> Result<(), AppError> {
    match mode {
        OutputMode::Full => print_reports(results, config, output),
        OutputMode::TableOnly => println!("{}", crate::report::format_batch_table(results)),
    }

    if output.export_json.is_some() || output.export_csv.is_some() {
        let records = export_records(results);
        if let Some(path) = &output.export_json {
            write_results_json(path, &records)?;
        }
        if let Some(path) = &output.export_csv {
            write_factors_csv(path, &records)?;
        }
    }
    Ok(())
}

fn print_reports(results: &RunResults, config: &VetConfig, output: &OutputArgs) {
    for (candidate, result) in crate::report::rank_by_priority(results) {
        match result {
            Ok(report) => {
                println!("{}", crate::report::format_report(report, config));
                if output.no_plot {
                    continue;
                }
                if let Some(phot) = &report.photometric {
                    let fit = phot.fit.as_ref();
                    let plot = crate::plot::render_light_curve(
                        &phot.samples,
                        fit.map(|f| &f.best.model),
                        fit.map(|f| f.peak_time),
                        output.width,
                        output.height,
                    );
                    println!("{plot}");
                }
            }
            Err(err) => println!(
                "=== {} vs {} ===\nError: {err}\n",
                candidate.target.name, candidate.event_id
            ),
        }
    }
}

/// Map CLI flags onto a `VetConfig`; anything without a flag keeps its default.
pub fn vet_config_from_args(args: &VetArgs) -> VetConfig {
    let defaults = VetConfig::default();
    VetConfig {
        skymap_threshold: args.skymap_threshold,
        penalty: args.penalty,
        point_source_radius_arcsec: args.point_source_radius,
        host_search_radius_arcmin: args.host_radius,
        pcc_threshold: args.pcc_threshold,
        min_host_redshift: args.min_host_redshift,
        filter_priority: args
            .filters
            .clone()
            .unwrap_or_else(|| defaults.filter_priority.clone()),
        inflate_peak_flux: !args.no_inflate,
        luminosity_max: args.luminosity_max,
        peak_time_max: args.peak_time_max,
        min_decay_rate: args.min_decay_rate,
        predetection_window_days: args.predetection_window,
        predetection_max_detections: args.predetection_max,
        minor_planet_radius_arcsec: args.minor_planet_radius,
        cosmology: Cosmology {
            h0: args.h0,
            omega_m: args.omega_m,
        },
        ..defaults
    }
}
