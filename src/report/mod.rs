//! Reporting utilities: batch ranking and formatted terminal output.

pub mod format;

pub use format::*;

use std::cmp::Ordering;

use crate::domain::Candidate;
use crate::error::AppError;
use crate::vetting::VetReport;

/// Order batch results for follow-up: highest priority first, failed runs
/// last, ties by target name.
pub fn rank_by_priority(
    results: &[(Candidate, Result<VetReport, AppError>)],
) -> Vec<&(Candidate, Result<VetReport, AppError>)> {
    let mut sorted: Vec<_> = results.iter().collect();
    sorted.sort_by(|(a, ra), (b, rb)| match (ra, rb) {
        (Ok(x), Ok(y)) => y
            .priority
            .cmp(&x.priority)
            .then_with(|| a.target.name.cmp(&b.target.name)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.target.name.cmp(&b.target.name),
    });
    sorted
}
