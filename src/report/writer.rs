// src/report/writer.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};
use crate::report::RunReport;

/// Persists [`RunReport`] snapshots, overwriting the previous one.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output: Option<PathBuf>,
    fs: Arc<dyn FileSystem>,
}

impl ReportWriter {
    pub fn new(output: Option<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self { output, fs }
    }

    /// Writer backed by the real filesystem.
    pub fn to_disk(output: Option<PathBuf>) -> Self {
        Self::new(output, Arc::new(RealFileSystem))
    }

    /// Writer that never writes.
    pub fn disabled() -> Self {
        Self::to_disk(None)
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    /// Serialize and store `report`. A no-op without an output path.
    pub fn write(&self, report: &RunReport<'_>) -> Result<()> {
        let Some(ref path) = self.output else {
            return Ok(());
        };

        let json = serde_json::to_vec_pretty(report)?;
        self.fs.write(path, &json)?;
        debug!(
            path = %path.display(),
            features = report.totals.total,
            "report snapshot written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use chrono::Utc;
    use std::time::Duration;

    #[test]
    fn disabled_writer_is_a_no_op() {
        let report = RunReport::new(Utc::now(), Duration::ZERO, false, &[], Duration::ZERO, 0);
        ReportWriter::disabled().write(&report).unwrap();
    }

    #[test]
    fn writes_json_to_configured_path() {
        let fs = MockFileSystem::new();
        let writer = ReportWriter::new(Some(PathBuf::from("out/report.json")), Arc::new(fs.clone()));
        let report = RunReport::new(Utc::now(), Duration::ZERO, true, &[], Duration::ZERO, 0);

        writer.write(&report).unwrap();

        let body = fs.read_to_string(Path::new("out/report.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["aborted"], true);
        assert_eq!(json["totals"]["total"], 0);
        assert_eq!(fs.write_count(), 1);
    }

    #[test]
    fn write_failures_surface_as_errors() {
        let fs = MockFileSystem::new();
        fs.fail_writes(true);
        let writer = ReportWriter::new(Some(PathBuf::from("r.json")), Arc::new(fs));
        let report = RunReport::new(Utc::now(), Duration::ZERO, false, &[], Duration::ZERO, 0);
        assert!(writer.write(&report).is_err());
    }
}
