// tests/report_snapshot.rs

mod common;
use crate::common::{init_tracing, with_timeout};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parallel_behat::engine::RunOptions;
use parallel_behat::fs::mock::MockFileSystem;
use parallel_behat::fs::FileSystem;
use parallel_behat::report::ReportWriter;
use parallel_behat_test_utils::builders::RuntimeBuilder;
use parallel_behat_test_utils::fake_executor::Outcome;
use tempfile::tempdir;

fn read_json(fs: &MockFileSystem, path: &str) -> serde_json::Value {
    let body = fs.read_to_string(Path::new(path)).unwrap();
    serde_json::from_str(&body).unwrap()
}

#[tokio::test]
async fn snapshot_is_rewritten_after_every_lifecycle_event() {
    init_tracing();

    let fs = MockFileSystem::new();
    let reporter = ReportWriter::new(Some(PathBuf::from("report.json")), Arc::new(fs.clone()));

    let h = RuntimeBuilder::new(&["awesome.feature", "flaky.feature"])
        .num_retries(1)
        .reporter(reporter)
        .script("awesome.feature", vec![Outcome::passed("3 scenarios (3 passed)")])
        .script(
            "flaky.feature",
            vec![
                Outcome::exit_with(1, "2 scenarios (1 passed, 1 failed)"),
                Outcome::passed("2 scenarios (2 passed)"),
            ],
        )
        .build();

    with_timeout(h.runtime.run()).await.unwrap();

    // three attempts, each started and finished, plus the final snapshot
    assert_eq!(fs.write_count(), 7);

    let json = read_json(&fs, "report.json");
    assert_eq!(json["aborted"], false);
    assert_eq!(json["totals"]["total"], 2);
    assert_eq!(json["totals"]["ok"], 2);
    assert_eq!(json["totals"]["retries"], 1);
    assert_eq!(json["totals"]["problems"], 0);
    assert_eq!(json["totals"]["unresolved"], 0);

    let awesome = &json["features"][0];
    assert_eq!(awesome["id"], 1);
    assert_eq!(awesome["descriptor"], "[1] awesome.feature");
    assert_eq!(awesome["command"], "behat   awesome.feature");
    assert_eq!(awesome["attempts"][0]["status"], "succeeded");
    assert_eq!(awesome["attempts"][0]["scenarios"]["passed"], 3);
    assert_eq!(awesome["attempts"][0]["scenarios"]["total"], 3);
    assert!(awesome["attempts"][0]["ended_at"].is_string());

    let flaky = &json["features"][1];
    assert_eq!(flaky["retries"], 1);
    assert_eq!(flaky["attempts"][0]["status"], "failed");
    assert_eq!(flaky["attempts"][0]["scenarios"]["failed"], 1);
    assert_eq!(flaky["attempts"][1]["status"], "succeeded");
}

#[tokio::test]
async fn aborted_run_writes_a_final_snapshot() {
    init_tracing();

    let fs = MockFileSystem::new();
    let reporter = ReportWriter::new(Some(PathBuf::from("report.json")), Arc::new(fs.clone()));

    let h = RuntimeBuilder::new(&["done.feature", "stuck.feature"])
        .options(RunOptions {
            max_duration: Some(Duration::from_millis(100)),
            ..RunOptions::default()
        })
        .reporter(reporter)
        .script("stuck.feature", vec![Outcome::hang()])
        .build();

    with_timeout(h.runtime.run()).await.unwrap();

    let json = read_json(&fs, "report.json");
    assert_eq!(json["aborted"], true);
    assert_eq!(json["totals"]["ok"], 1);
    assert_eq!(json["totals"]["unresolved"], 1);
    assert_eq!(json["features"][1]["running"], true);
    assert!(json["features"][1]["attempts"][0]["status"].is_null());
}

#[tokio::test]
async fn write_failures_are_logged_and_the_run_continues() {
    init_tracing();

    let fs = MockFileSystem::new();
    fs.fail_writes(true);
    let reporter = ReportWriter::new(Some(PathBuf::from("report.json")), Arc::new(fs.clone()));

    let h = RuntimeBuilder::new(&["awesome.feature"])
        .reporter(reporter)
        .build();

    let outcome = with_timeout(h.runtime.run()).await.unwrap();

    assert!(outcome.all_ok());
    let errors = h.logs.starting_with("[Error writing to logfile \"report.json\" -- ");
    assert_eq!(errors.len(), 3);
    assert!(errors[0].ends_with(']'));
    assert_eq!(h.logs.starting_with("Finished in ").len(), 1);
}

#[tokio::test]
async fn snapshot_lands_on_disk() {
    init_tracing();

    let dir = tempdir().unwrap();
    let path = dir.path().join("build").join("report.json");

    let h = RuntimeBuilder::new(&["awesome.feature"])
        .reporter(ReportWriter::to_disk(Some(path.clone())))
        .build();

    with_timeout(h.runtime.run()).await.unwrap();

    let body = std::fs::read_to_string(&path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["totals"]["ok"], 1);
    assert!(!path.with_extension("json.tmp").exists());
}
