//! Photometry CSV ingest.
//!
//! Turns a photometry export into clean `PhotometryPoint`s grouped by target.
//!
//! Expected columns (case-insensitive, any order):
//!
//! - `target_id` (required)
//! - `timestamp` (RFC 3339 or `YYYY-MM-DD HH:MM:SS`) or `mjd`
//! - `filter` (required)
//! - `magnitude` + `error` for detections, or `limit` for non-detections
//! - `telescope` (optional)
//!
//! Bad rows are skipped and reported; a missing required column fails the
//! whole file.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use csv::StringRecord;

use crate::domain::{dedup_photometry, Measurement, PhotometryPoint};
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub target_id: Option<i64>,
    pub message: String,
}

/// Ingest output: photometry per target plus what was dropped.
#[derive(Debug, Clone, Default)]
pub struct IngestedPhotometry {
    pub by_target: BTreeMap<i64, Vec<PhotometryPoint>>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    /// Points kept after deduplication.
    pub rows_used: usize,
}

/// Load a photometry CSV from disk.
pub fn load_photometry_csv(path: &Path) -> Result<IngestedPhotometry, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::io(format!("Failed to open CSV '{}': {e}", path.display()))
    })?;
    read_photometry_csv(file)
}

/// Parse photometry CSV from any reader.
pub fn read_photometry_csv<R: Read>(input: R) -> Result<IngestedPhotometry, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    ensure_required_columns_exist(&header_map)?;

    let mut grouped: BTreeMap<i64, Vec<PhotometryPoint>> = BTreeMap::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    target_id: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let target_id =
            get_optional(&record, &header_map, "target_id").and_then(|s| s.parse().ok());
        match parse_row(&record, &header_map) {
            Ok((id, point)) => grouped.entry(id).or_default().push(point),
            Err(message) => row_errors.push(RowError {
                line,
                target_id,
                message,
            }),
        }
    }

    let by_target: BTreeMap<i64, Vec<PhotometryPoint>> = grouped
        .into_iter()
        .map(|(id, points)| (id, dedup_photometry(points)))
        .collect();
    let rows_used = by_target.values().map(Vec::len).sum();

    Ok(IngestedPhotometry {
        by_target,
        row_errors,
        rows_read,
        rows_used,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn ensure_required_columns_exist(header_map: &HashMap<String, usize>) -> Result<(), AppError> {
    for column in ["target_id", "filter"] {
        if !header_map.contains_key(column) {
            return Err(AppError::input(format!("Missing required column: `{column}`")));
        }
    }
    if !header_map.contains_key("timestamp") && !header_map.contains_key("mjd") {
        return Err(AppError::input(
            "Missing required column: `timestamp` (or `mjd`)",
        ));
    }
    if !header_map.contains_key("magnitude") && !header_map.contains_key("limit") {
        return Err(AppError::input(
            "Photometry needs a `magnitude` or a `limit` column.",
        ));
    }
    Ok(())
}

fn parse_row(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
) -> Result<(i64, PhotometryPoint), String> {
    let target_id = get_required(record, header_map, "target_id")?
        .parse::<i64>()
        .map_err(|_| "Invalid `target_id`.".to_string())?;

    let timestamp = match get_optional(record, header_map, "timestamp") {
        Some(s) => parse_timestamp(s)?,
        None => {
            let mjd = parse_opt_f64(get_optional(record, header_map, "mjd"))
                .ok_or_else(|| "Missing/invalid `timestamp` or `mjd`.".to_string())?;
            from_mjd(mjd)?
        }
    };

    let filter = get_required(record, header_map, "filter")?.to_string();
    let magnitude = parse_opt_f64(get_optional(record, header_map, "magnitude"));
    let error = parse_opt_f64(get_optional(record, header_map, "error"));
    let limit = parse_opt_f64(get_optional(record, header_map, "limit"));

    let measurement = match (magnitude, limit) {
        (Some(mag), _) => {
            let error = error.ok_or_else(|| "Detection without a valid `error`.".to_string())?;
            if error <= 0.0 {
                return Err("Magnitude `error` must be > 0.".to_string());
            }
            Measurement::Magnitude { mag, error }
        }
        (None, Some(mag)) => Measurement::Limit { mag },
        (None, None) => return Err("Row has neither `magnitude` nor `limit`.".to_string()),
    };

    let telescope = get_optional(record, header_map, "telescope").map(str::to_string);

    Ok((
        target_id,
        PhotometryPoint {
            timestamp,
            filter,
            measurement,
            telescope,
        },
    ))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    const FMTS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];
    for fmt in FMTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(format!(
        "Invalid timestamp '{s}'. Expected RFC 3339 or YYYY-MM-DD HH:MM:SS."
    ))
}

fn from_mjd(mjd: f64) -> Result<DateTime<Utc>, String> {
    let millis = ((mjd - 40_587.0) * 86_400_000.0).round();
    DateTime::from_timestamp_millis(millis as i64)
        .ok_or_else(|| format!("MJD {mjd} is out of range."))
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    get_optional(record, header_map, name)
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let v = s?.parse::<f64>().ok()?;
    v.is_finite().then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::to_mjd;

    const CSV: &str = "\
target_id,timestamp,filter,magnitude,error,limit,telescope
1,2023-05-20T12:00:00Z,r,18.1,0.05,,ZTF
1,2023-05-19 12:00:00,r,,,20.5,ZTF
1,2023-05-20T12:00:00Z,r,18.1,0.05,,ZTF
2,2023-05-21T00:00:00Z,g,19.0,,,ATLAS
2,not-a-date,g,19.0,0.1,,ATLAS
3,2023-05-21T00:00:00Z,i,19.2,0.08,,
";

    #[test]
    fn groups_dedups_and_reports_bad_rows() {
        let out = read_photometry_csv(CSV.as_bytes()).unwrap();
        assert_eq!(out.rows_read, 6);
        assert_eq!(out.row_errors.len(), 2);
        assert!(out.row_errors.iter().all(|e| e.target_id == Some(2)));
        assert_eq!(out.row_errors[0].line, 5);

        let t1 = &out.by_target[&1];
        assert_eq!(t1.len(), 2);
        // Sorted by time: the limit comes first.
        assert!(!t1[0].is_detection());
        assert!(t1[1].is_detection());
        assert!(!out.by_target.contains_key(&2));
        assert_eq!(out.by_target[&3][0].telescope, None);
        assert_eq!(out.rows_used, 3);
    }

    #[test]
    fn missing_filter_column_fails_file() {
        let csv = "target_id,timestamp,magnitude\n1,2023-01-01T00:00:00Z,18\n";
        let err = read_photometry_csv(csv.as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn mjd_column_is_accepted() {
        let csv = "target_id,mjd,filter,magnitude,error\n7,60000.5,r,18,0.1\n";
        let out = read_photometry_csv(csv.as_bytes()).unwrap();
        let p = &out.by_target[&7][0];
        assert!((to_mjd(&p.timestamp) - 60_000.5).abs() < 1e-6);
    }
}
