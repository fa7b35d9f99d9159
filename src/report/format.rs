//! Formatted terminal output for vetting runs.
//!
//! Formatting lives here so the pipeline stays free of presentation code.

use crate::domain::{Candidate, HostGalaxyCandidate, VetConfig};
use crate::error::AppError;
use crate::vetting::VetReport;

use super::rank_by_priority;

/// Full summary of one candidate's run.
pub fn format_report(report: &VetReport, config: &VetConfig) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "=== {} vs {} ===\n",
        report.target_name, report.event_id
    ));
    out.push_str(&format!("Priority: {}\n", report.priority));
    if let Some(exit) = report.early_exit {
        out.push_str(&format!("Stopped early: {}\n", exit.describe()));
    }

    let s = &report.scores;
    out.push_str("\nSub-scores:\n");
    for (label, value) in [
        ("skymap", s.skymap),
        ("point source", s.point_source),
        ("minor planet", s.minor_planet),
        ("host distance", s.host_distance),
        ("photometric", s.photometric),
        ("predetection", s.predetection),
    ] {
        out.push_str(&format!("  {label:<14} {value:.4}\n"));
    }

    let sky = &report.skymap;
    out.push_str(&format!(
        "\nSkymap: localization={} enclosed={:.4} | D_L={:.1} ± {:.1} Mpc\n",
        sky.localization_id, sky.enclosed_probability, sky.distance_mean, sky.distance_std
    ));

    if let Some(m) = &report.point_source_match {
        let sep = m
            .separation_arcsec
            .map(|s| format!("{s:.2}\""))
            .unwrap_or_else(|| "n/a".to_string());
        out.push_str(&format!("Point source: {} in {} (sep {sep})\n", m.name, m.catalog));
    }
    if let Some(hit) = &report.minor_planet_match {
        out.push_str(&format!(
            "Minor planet: {} (sep {:.1}\", detected MJD {:.3})\n",
            hit.object.name, hit.object.separation_arcsec, hit.detection_mjd
        ));
    }

    if report.early_exit.is_none() {
        out.push_str(&format!(
            "\nHost candidates (PCC <= {:.3}):\n",
            config.pcc_threshold
        ));
        out.push_str(&format_hosts(&report.hosts));
    }

    if let Some(phot) = &report.photometric {
        out.push_str("\nPhotometry:\n");
        match &phot.band {
            Some(band) => out.push_str(&format!(
                "- band {band}, {} detections\n",
                phot.n_detections
            )),
            None => out.push_str("- no usable detections\n"),
        }
        if let Some(lum) = phot.peak_luminosity {
            out.push_str(&format!("- peak nu L_nu: {lum:.3e} erg/s\n"));
        }
        if let Some(fit) = &phot.fit {
            let q = &fit.best.quality;
            out.push_str(&format!(
                "- model {} params {} | SSE={:.4} RMSE={:.4} AICc={:.3} n={}\n",
                fit.best.model.display_name,
                fmt_vec(&fit.best.model.params),
                q.sse,
                q.rmse,
                q.aicc,
                q.n
            ));
            out.push_str(&format!(
                "- peak at {:.2} d, decay {:.3} mag/d\n",
                fit.peak_time, fit.decay_rate
            ));
        }
    }

    if let Some(pre) = &report.predetection {
        out.push_str(&format!(
            "\nPre-discovery: {} points, max {} detections in one window ({} observations)\n",
            pre.n_points, pre.max_detections, pre.observations_in_window
        ));
    }

    out
}

/// Host table, best PCC first.
pub fn format_hosts(hosts: &[HostGalaxyCandidate]) -> String {
    if hosts.is_empty() {
        return "  (none)\n".to_string();
    }
    let mut out = String::new();
    out.push_str(
        format!(
            "  {:<20} {:>8} {:>8} {:>7} {:>16} {:<10}\n",
            "name", "pcc", "offset", "mag", "D_L (Mpc)", "catalog"
        )
        .trim_end(),
    );
    out.push('\n');
    for h in hosts {
        let dist = format!(
            "{:.1} -{:.1}/+{:.1}",
            h.distance, h.distance_err.neg, h.distance_err.pos
        );
        out.push_str(
            format!(
                "  {:<20} {:>8.4} {:>8.1} {:>7.2} {:>16} {:<10}\n",
                truncate(&h.name, 20),
                h.pcc,
                h.offset_arcsec,
                h.magnitude,
                dist,
                truncate(&h.catalog, 10)
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// One line per candidate, ranked by priority.
pub fn format_batch_table(results: &[(Candidate, Result<VetReport, AppError>)]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<20} {:<12} {:>8} {:<30}\n",
            "target", "event", "priority", "note"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<20} {:-<12} {:-<8} {:-<30}\n", "", "", "", "").trim_end());
    out.push('\n');

    for (candidate, result) in rank_by_priority(results) {
        let (priority, note) = match result {
            Ok(report) => (
                report.priority.to_string(),
                report
                    .early_exit
                    .map(|e| e.describe().to_string())
                    .unwrap_or_default(),
            ),
            Err(e) => ("-".to_string(), format!("error: {e}")),
        };
        out.push_str(
            format!(
                "{:<20} {:<12} {:>8} {:<30}\n",
                truncate(&candidate.target.name, 20),
                truncate(&candidate.event_id, 12),
                priority,
                note
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.4}")).collect();
    format!("[{}]", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
