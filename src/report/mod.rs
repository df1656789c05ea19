// src/report/mod.rs

//! Aggregate run state and its JSON snapshot.
//!
//! - [`RunReport`] is a borrowed view over the orchestrator's features,
//!   built on demand after each lifecycle event.
//! - [`ReportWriter`] persists that view when an output path is configured.

pub mod writer;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::feature::FeatureTask;

pub use writer::ReportWriter;

/// Aggregate counters over all features of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportTotals {
    pub total: usize,
    pub ok: usize,
    /// Features whose current attempt has been running longer than the
    /// configured threshold.
    pub running_over_threshold: usize,
    /// Sum of standard-policy retries across features.
    pub retries: u32,
    /// Features whose every closed attempt was a kill or unknown error.
    pub problems: usize,
    /// Features with a submission the executor has not finished yet.
    pub unresolved: usize,
}

impl ReportTotals {
    pub fn compute(
        features: &[FeatureTask],
        long_running_threshold: Duration,
        unresolved: usize,
    ) -> Self {
        let threshold = long_running_threshold.as_secs();
        Self {
            total: features.len(),
            ok: features.iter().filter(|f| f.is_ok()).count(),
            running_over_threshold: features
                .iter()
                .filter(|f| f.is_running() && f.current_duration() >= threshold)
                .count(),
            retries: features.iter().map(|f| f.retries()).sum(),
            problems: features.iter().filter(|f| f.has_problems()).count(),
            unresolved,
        }
    }
}

/// Snapshot of a run, serialized as the JSON report.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport<'a> {
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub aborted: bool,
    pub totals: ReportTotals,
    pub features: &'a [FeatureTask],
}

impl<'a> RunReport<'a> {
    pub fn new(
        started_at: DateTime<Utc>,
        elapsed: Duration,
        aborted: bool,
        features: &'a [FeatureTask],
        long_running_threshold: Duration,
        unresolved: usize,
    ) -> Self {
        Self {
            started_at,
            elapsed_secs: elapsed.as_secs_f64(),
            aborted,
            totals: ReportTotals::compute(features, long_running_threshold, unresolved),
            features,
        }
    }
}
