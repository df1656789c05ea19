// src/lib.rs

pub mod cli;
pub mod config;
pub mod discover;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod feature;
pub mod fs;
pub mod logging;
pub mod report;
pub mod types;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{default_config_path, load_from_path, load_or_default, ConfigFile};
use crate::discover::discover_features;
use crate::engine::{BehatCore, RunEvent, RunOptions, RunOutcome, Runtime};
use crate::exec::{PoolSettings, RealExecutorBackend};
use crate::report::ReportWriter;

/// High-level entry point used by `main.rs`.
///
/// Loads and validates config (with CLI overrides), discovers the feature
/// files, then runs them. Returns whether every feature ended ok.
pub async fn run(args: CliArgs) -> Result<bool> {
    let mut raw = match args.config {
        Some(ref path) => load_from_path(path)?,
        None => load_or_default(default_config_path())?,
    };
    args.apply_overrides(&mut raw);
    let cfg = ConfigFile::try_from(raw)?;

    let files = discover_features(&cfg.run.src)?;
    info!(pattern = %cfg.run.src, count = files.len(), "discovered feature files");

    if args.dry_run {
        print_dry_run(&cfg, &files);
        return Ok(true);
    }

    let outcome = run_features(&cfg, files).await?;
    Ok(outcome.all_ok())
}

/// Run `files` with the process pool, the on-disk report writer and Ctrl-C
/// handling wired up.
pub async fn run_features(cfg: &ConfigFile, files: Vec<String>) -> Result<RunOutcome> {
    let (rt_tx, rt_rx) = mpsc::channel::<RunEvent>(256);

    let executor = RealExecutorBackend::new(PoolSettings::from_config(cfg), rt_tx.clone());

    // Ctrl-C → abort path: terminate everything, write the final report.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RunEvent::ShutdownRequested).await;
        });
    }

    let core = BehatCore::new(files, cfg.command_template(), RunOptions::from_config(cfg));
    let runtime = Runtime::new(core, rt_rx, executor)
        .with_reporter(ReportWriter::to_disk(cfg.report.output.clone()));

    Ok(runtime.run().await?)
}

/// Print the resolved settings and the command for every feature.
fn print_dry_run(cfg: &ConfigFile, files: &[String]) {
    let template = cfg.command_template();

    println!("parallel-behat dry-run");
    println!("  run.src = {}", cfg.run.src);
    println!("  pool.max_processes = {}", cfg.pool.max_processes);
    println!("  pool.timeout = {:?}", cfg.process_timeout());
    println!("  retry.num_retries = {}", cfg.retry.num_retries);
    if let Some(limit) = cfg.max_duration() {
        println!("  run.max_duration = {limit:?}");
    }
    if let Some(ref output) = cfg.report.output {
        println!("  report.output = {}", output.display());
    }
    println!();

    println!("features ({}):", files.len());
    for (idx, file) in files.iter().enumerate() {
        println!("  [{}] {}", idx + 1, template.file_to_command(file));
    }

    debug!("dry-run complete (no execution)");
}
