// tests/process_pool.rs
//
// End-to-end runs through the real process pool. Each "feature file" is a
// small shell script and the runner binary is `sh`.

#![cfg(unix)]

mod common;
use crate::common::{feature, init_tracing, with_timeout};

use std::fs;
use std::path::Path;

use parallel_behat::cli::CliArgs;
use parallel_behat::discover::discover_features;
use parallel_behat::engine::AbortReason;
use parallel_behat::feature::AttemptStatus;
use parallel_behat::{run, run_features};
use parallel_behat_test_utils::builders::ConfigFileBuilder;
use tempfile::tempdir;

const PASSING: &str = "echo '2 scenarios (2 passed)'\necho '4 steps (4 passed)'\necho '0m0.01s'\n";

fn write_feature(dir: &Path, name: &str, script: &str) {
    fs::write(dir.join(name), script).unwrap();
}

fn sh_config(dir: &Path) -> ConfigFileBuilder {
    ConfigFileBuilder::new()
        .src(&format!("{}/*.feature", dir.display()))
        .bin("sh")
        .runner_config(None)
        .base_dir("")
}

#[tokio::test]
async fn classifies_real_process_outcomes() {
    init_tracing();

    let dir = tempdir().unwrap();
    write_feature(dir.path(), "pass.feature", PASSING);
    write_feature(
        dir.path(),
        "fail.feature",
        "echo '1 scenario (1 failed)'\necho '1 step (1 failed)'\necho '0m0.01s'\nexit 1\n",
    );
    write_feature(dir.path(), "broken.feature", "echo 'Fatal error' >&2\nexit 7\n");

    let cfg = sh_config(dir.path()).num_retries(1).max_processes(2).build();
    let files = discover_features(&cfg.run.src).unwrap();
    assert_eq!(files.len(), 3);

    let outcome = with_timeout(run_features(&cfg, files)).await.unwrap();

    assert_eq!(outcome.aborted, None);
    assert!(!outcome.all_ok());

    let pass = feature(&outcome, &format!("{}/pass.feature", dir.path().display()));
    assert!(pass.is_ok());
    assert_eq!(pass.attempts()[0].scenarios().map(|s| s.total), Some(2));

    let fail = feature(&outcome, &format!("{}/fail.feature", dir.path().display()));
    assert_eq!(fail.attempts().len(), 2);
    assert_eq!(fail.retries(), 1);
    assert_eq!(fail.status(), Some(AttemptStatus::Failed));

    let broken = feature(&outcome, &format!("{}/broken.feature", dir.path().display()));
    assert_eq!(broken.attempts().len(), 1);
    assert_eq!(broken.status(), Some(AttemptStatus::Unknown));
}

#[tokio::test]
async fn pool_never_runs_more_than_max_processes() {
    init_tracing();

    let dir = tempdir().unwrap();
    let live = dir.path().join("live");
    let counts = dir.path().join("counts.log");
    fs::create_dir(&live).unwrap();

    // Each feature registers itself in `live`, records how many peers are
    // running, lingers, then deregisters.
    let script = format!(
        "mkdir {live}/$$\nls {live} | wc -l >> {counts}\nsleep 0.3\nrmdir {live}/$$\n{PASSING}",
        live = live.display(),
        counts = counts.display(),
    );
    for i in 0..6 {
        write_feature(dir.path(), &format!("f{i}.feature"), &script);
    }

    let cfg = sh_config(dir.path()).max_processes(2).build();
    let files = discover_features(&cfg.run.src).unwrap();
    assert_eq!(files.len(), 6);

    let outcome = with_timeout(run_features(&cfg, files)).await.unwrap();
    assert!(outcome.all_ok());
    assert_eq!(outcome.totals.ok, 6);

    let observed: Vec<usize> = fs::read_to_string(&counts)
        .unwrap()
        .lines()
        .map(|l| l.trim().parse().unwrap())
        .collect();
    assert_eq!(observed.len(), 6);
    let peak = observed.iter().copied().max().unwrap();
    assert!(peak <= 2, "saw {peak} concurrent processes: {observed:?}");
}

#[tokio::test]
async fn slow_processes_are_killed_after_the_pool_timeout() {
    init_tracing();

    let dir = tempdir().unwrap();
    write_feature(dir.path(), "slow.feature", "sleep 5\n");

    let cfg = sh_config(dir.path()).process_timeout("200ms").build();
    let files = discover_features(&cfg.run.src).unwrap();

    let outcome = with_timeout(run_features(&cfg, files)).await.unwrap();

    let slow = &outcome.features[0];
    assert_eq!(slow.status(), Some(AttemptStatus::ForceKillTimeout));
    assert!(slow.has_problems());
}

#[tokio::test]
async fn deadline_terminates_running_processes() {
    init_tracing();

    let dir = tempdir().unwrap();
    write_feature(dir.path(), "quick.feature", PASSING);
    write_feature(dir.path(), "stuck.feature", "sleep 5\n");

    let report = dir.path().join("report.json");
    let cfg = sh_config(dir.path())
        .max_duration("500ms")
        .output(&report)
        .build();
    let files = discover_features(&cfg.run.src).unwrap();

    let outcome = with_timeout(run_features(&cfg, files)).await.unwrap();

    assert_eq!(outcome.aborted, Some(AbortReason::Deadline));
    assert_eq!(outcome.totals.ok, 1);
    assert_eq!(outcome.totals.unresolved, 1);

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["aborted"], true);
}

#[tokio::test]
async fn dry_run_executes_nothing() {
    init_tracing();

    let dir = tempdir().unwrap();
    let marker = dir.path().join("ran");
    write_feature(
        dir.path(),
        "touch.feature",
        &format!("touch {}\n", marker.display()),
    );

    let args = CliArgs {
        src: Some(format!("{}/*.feature", dir.path().display())),
        dry_run: true,
        config: Some(dir.path().join("missing-is-fine-only-by-default.toml")),
        ..CliArgs::default()
    };
    // an explicit config path must exist
    assert!(run(args.clone()).await.is_err());

    let config = dir.path().join("ParallelBehat.toml");
    fs::write(&config, "[runner]\nbin = \"sh\"\n").unwrap();
    let args = CliArgs {
        config: Some(config),
        ..args
    };
    assert!(run(args).await.unwrap());
    assert!(!marker.exists());
}
