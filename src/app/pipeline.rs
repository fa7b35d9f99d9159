//! Shared vetting workflow used by every subcommand.
//!
//! scenario load -> optional photometry merge -> candidate selection -> parallel vetting
//!
//! The subcommands then only differ in presentation (full reports vs ranked table).

use std::path::Path;

use tracing::{info, warn};

use crate::domain::{Candidate, VetConfig};
use crate::error::AppError;
use crate::io::{LoadedScenario, load_photometry_csv, read_scenario_file};
use crate::vetting::{VetReport, Vetter};

/// Per-candidate outcome of one run, in scenario order.
pub type RunResults = Vec<(Candidate, Result<VetReport, AppError>)>;

/// Read a scenario file and merge an optional photometry CSV into its store.
pub fn load_scenario(
    path: &Path,
    photometry_csv: Option<&Path>,
) -> Result<LoadedScenario, AppError> {
    let loaded = read_scenario_file(path)?.load()?;

    if let Some(csv_path) = photometry_csv {
        let ingested = load_photometry_csv(csv_path)?;
        for row in &ingested.row_errors {
            warn!(
                line = row.line,
                target_id = ?row.target_id,
                "skipped photometry row: {}",
                row.message
            );
        }
        info!(
            rows_read = ingested.rows_read,
            rows_used = ingested.rows_used,
            targets = ingested.by_target.len(),
            "merged photometry CSV"
        );
        for (target_id, points) in ingested.by_target {
            loaded.store.insert_photometry(target_id, points)?;
        }
    }

    Ok(loaded)
}

/// Vet the selected candidates of a loaded scenario.
///
/// Asking for a target name the scenario does not contain is an input error.
pub fn run_candidates(
    loaded: &LoadedScenario,
    config: &VetConfig,
    target: Option<&str>,
) -> Result<RunResults, AppError> {
    let candidates = loaded.select(target);
    if candidates.is_empty() {
        return Err(match target {
            Some(name) => AppError::input(format!("No candidate named '{name}' in the scenario.")),
            None => AppError::input("Scenario has no candidates."),
        });
    }

    let vetter = Vetter::new(config.clone(), loaded.collaborators())?;
    let results = vetter.vet_batch(candidates, loaded.cutoff);

    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    info!(vetted = results.len() - failed, failed, "vetting finished");
    Ok(results)
}

/// Collapse a run into the process result: a lone failure, or a batch where
/// every candidate failed, is reported as an error.
pub fn run_status(results: &RunResults) -> Result<(), AppError> {
    let mut errors = results.iter().filter_map(|(_, r)| r.as_ref().err());
    match errors.next() {
        Some(first) if results.iter().all(|(_, r)| r.is_err()) => Err(AppError::new(
            first.kind(),
            format!("All {} candidate(s) failed; first error: {first}", results.len()),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DemoOptions, generate_demo};
    use crate::error::ErrorKind;
    use crate::io::write_scenario_file;
    use std::io::Write;

    fn demo_file(dir: &Path) -> std::path::PathBuf {
        let scenario = generate_demo(&DemoOptions::default()).unwrap();
        let path = dir.join("scenario.json");
        write_scenario_file(&path, &scenario).unwrap();
        path
    }

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("kn-vet-pipeline-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn unknown_target_is_input_error() {
        let dir = temp_dir("unknown");
        let loaded = load_scenario(&demo_file(&dir), None).unwrap();
        let err = run_candidates(&loaded, &VetConfig::default(), Some("nope")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn csv_photometry_is_merged() {
        let dir = temp_dir("merge");
        let scenario = demo_file(&dir);
        let loaded = load_scenario(&scenario, None).unwrap();
        let target_id = loaded.candidates[0].target.id;

        let csv_path = dir.join("extra.csv");
        let mut f = std::fs::File::create(&csv_path).unwrap();
        writeln!(f, "target_id,mjd,filter,magnitude,error").unwrap();
        writeln!(f, "{target_id},60100.0,g,21.0,0.1").unwrap();
        writeln!(f, "bad,60100.0,g,21.0,0.1").unwrap();
        drop(f);

        let before = crate::store::PhotometryStore::photometry(&loaded.store, target_id)
            .unwrap()
            .len();
        let merged = load_scenario(&scenario, Some(&csv_path)).unwrap();
        let after = crate::store::PhotometryStore::photometry(&merged.store, target_id)
            .unwrap()
            .len();
        assert_eq!(after, before + 1);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn status_fails_only_when_everything_failed() {
        let dir = temp_dir("status");
        let loaded = load_scenario(&demo_file(&dir), None).unwrap();
        let results = run_candidates(&loaded, &VetConfig::default(), None).unwrap();
        assert!(run_status(&results).is_ok());

        let failed: RunResults = results
            .into_iter()
            .map(|(c, _)| (c, Err(AppError::new(ErrorKind::LocalizationNotFound, "gone"))))
            .collect();
        let err = run_status(&failed).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LocalizationNotFound);
        std::fs::remove_dir_all(dir).ok();
    }
}
