//! Export vetting results to JSON and CSV.
//!
//! The CSV is one row per candidate with one column per factor key, meant for
//! spreadsheets. The JSON keeps everything, including the host summaries.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::domain::{Candidate, FactorValue, HostGalaxyCandidate};
use crate::error::AppError;
use crate::vetting::host_galaxy::host_summary;
use crate::vetting::VetReport;

/// One candidate's outcome in export form.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateExport {
    pub target_id: i64,
    pub target: String,
    pub event_id: String,
    pub priority: Option<u8>,
    pub early_exit: Option<String>,
    /// Message of the error that aborted the run, if any.
    pub error: Option<String>,
    pub factors: BTreeMap<String, FactorValue>,
    pub hosts: serde_json::Value,
}

impl CandidateExport {
    pub fn new(candidate: &Candidate, result: &Result<VetReport, AppError>) -> Self {
        let no_hosts: &[HostGalaxyCandidate] = &[];
        let (early_exit, error, hosts) = match result {
            Ok(report) => (
                report.early_exit.map(|e| e.describe().to_string()),
                None,
                report.hosts.as_slice(),
            ),
            Err(e) => (None, Some(e.to_string()), no_hosts),
        };
        Self {
            target_id: candidate.target.id,
            target: candidate.target.name.clone(),
            event_id: candidate.event_id.clone(),
            priority: candidate.priority,
            early_exit,
            error,
            factors: candidate.factors.clone(),
            hosts: host_summary(hosts),
        }
    }
}

/// Build export records for a batch of results.
pub fn export_records(
    results: &[(Candidate, Result<VetReport, AppError>)],
) -> Vec<CandidateExport> {
    results
        .iter()
        .map(|(candidate, result)| CandidateExport::new(candidate, result))
        .collect()
}

/// Write records as pretty JSON.
pub fn write_results_json(path: &Path, records: &[CandidateExport]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| {
            AppError::io(format!("Failed to create export JSON '{}': {e}", path.display()))
        })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records)
        .map_err(|e| AppError::io(format!("Failed to write export JSON: {e}")))?;
    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to flush export JSON: {e}")))
}

/// Write one CSV row per candidate; factor columns are the union of all keys.
pub fn write_factors_csv(path: &Path, records: &[CandidateExport]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| {
            AppError::io(format!("Failed to create export CSV '{}': {e}", path.display()))
        })?;
    write_factors(file, records)
}

fn write_factors<W: Write>(out: W, records: &[CandidateExport]) -> Result<(), AppError> {
    let keys: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.factors.keys().map(String::as_str))
        .collect();

    let mut writer = csv::Writer::from_writer(out);
    let csv_err = |e: csv::Error| AppError::io(format!("Failed to write export CSV: {e}"));

    let mut header = vec!["target_id", "target", "event_id", "priority", "early_exit", "error"];
    header.extend(keys.iter().copied());
    writer.write_record(&header).map_err(csv_err)?;

    for r in records {
        let mut row = vec![
            r.target_id.to_string(),
            r.target.clone(),
            r.event_id.clone(),
            r.priority.map(|p| p.to_string()).unwrap_or_default(),
            r.early_exit.clone().unwrap_or_default(),
            r.error.clone().unwrap_or_default(),
        ];
        row.extend(
            keys.iter()
                .map(|k| r.factors.get(*k).map(FactorValue::to_string).unwrap_or_default()),
        );
        writer.write_record(&row).map_err(csv_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to flush export CSV: {e}")))
}
