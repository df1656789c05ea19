#![allow(dead_code)]

use std::io::Write;

use parallel_behat::engine::RunOutcome;
use parallel_behat::feature::FeatureTask;
use tempfile::NamedTempFile;

pub use parallel_behat_test_utils::{init_tracing, with_timeout};

/// Write `contents` to a temporary `.toml` file.
pub fn config_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    write!(file, "{contents}").unwrap();
    file
}

/// The feature for `filename` in a finished run.
pub fn feature<'a>(outcome: &'a RunOutcome, filename: &str) -> &'a FeatureTask {
    outcome
        .features
        .iter()
        .find(|f| f.filename() == filename)
        .unwrap_or_else(|| panic!("no feature named {filename}"))
}
