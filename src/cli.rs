// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::RawConfigFile;

/// Command-line arguments for `parallel-behat`.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "parallel-behat",
    version,
    about = "Run Behat feature files in parallel, retrying flaky ones.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `ParallelBehat.toml` in the current working directory, or
    /// built-in defaults when that file does not exist.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Glob selecting the feature files (overrides `[run].src`).
    #[arg(long, value_name = "GLOB")]
    pub src: Option<String>,

    /// Standard retries per feature (overrides `[retry].num_retries`).
    #[arg(long, value_name = "N")]
    pub num_retries: Option<u32>,

    /// Maximum concurrent runner processes (overrides `[pool].max_processes`).
    #[arg(long, value_name = "N")]
    pub max_processes: Option<usize>,

    /// Write a JSON report snapshot here (overrides `[report].output`).
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Abort the run after this long, e.g. `45m` (overrides `[run].max_duration`).
    #[arg(long, value_name = "DURATION")]
    pub max_duration: Option<String>,

    /// Print process errors and captured output after every attempt.
    #[arg(long)]
    pub debug: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PARALLEL_BEHAT_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate config, list the commands that would run, and exit.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    /// Apply flags given on the command line on top of the file config.
    pub fn apply_overrides(&self, raw: &mut RawConfigFile) {
        if let Some(ref src) = self.src {
            raw.run.src = src.clone();
        }
        if let Some(n) = self.num_retries {
            raw.retry.num_retries = n;
        }
        if let Some(n) = self.max_processes {
            raw.pool.max_processes = n;
        }
        if let Some(ref output) = self.output {
            raw.report.output = Some(output.clone());
        }
        if let Some(ref limit) = self.max_duration {
            raw.run.max_duration = Some(limit.clone());
        }
        if self.debug {
            raw.run.debug = true;
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_values() {
        let args = CliArgs::parse_from([
            "parallel-behat",
            "--src",
            "features/*.feature",
            "--num-retries",
            "2",
            "--max-processes",
            "4",
            "--output",
            "report.json",
            "--max-duration",
            "30m",
            "--debug",
        ]);
        let mut raw = RawConfigFile::default();
        raw.retry.num_retries = 7;

        args.apply_overrides(&mut raw);

        assert_eq!(raw.run.src, "features/*.feature");
        assert_eq!(raw.retry.num_retries, 2);
        assert_eq!(raw.pool.max_processes, 4);
        assert_eq!(raw.report.output, Some(PathBuf::from("report.json")));
        assert_eq!(raw.run.max_duration.as_deref(), Some("30m"));
        assert!(raw.run.debug);
    }

    #[test]
    fn absent_flags_keep_file_values() {
        let args = CliArgs::parse_from(["parallel-behat"]);
        let mut raw = RawConfigFile::default();
        raw.retry.num_retries = 3;
        raw.run.debug = true;

        args.apply_overrides(&mut raw);

        assert_eq!(raw.retry.num_retries, 3);
        assert!(raw.run.debug);
        assert_eq!(raw.pool.max_processes, 10_000);
        assert!(args.config.is_none());
    }
}
