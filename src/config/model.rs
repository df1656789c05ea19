// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::feature::CommandTemplate;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [run]
/// src = "features/**/*.feature"
/// max_duration = "45m"
///
/// [runner]
/// bin = "./bin/behat"
/// config = "./behat.yml"
/// flags = "--tags ~@wip"
///
/// [pool]
/// max_processes = 8
/// timeout = "10m"
///
/// [retry]
/// num_retries = 2
///
/// [report]
/// output = "build/behat-report.json"
/// ```
///
/// Every section and key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub runner: RunnerSection,
    #[serde(default)]
    pub pool: PoolSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub exit_codes: ExitCodeSection,
    #[serde(default)]
    pub report: ReportSection,
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>`, so durations are
/// already parsed and cross-field checks have passed.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub run: RunSection,
    pub runner: RunnerSection,
    pub pool: PoolSection,
    pub retry: RetrySection,
    pub exit_codes: ExitCodeSection,
    pub report: ReportSection,
    max_duration: Option<Duration>,
    process_timeout: Duration,
    long_running_threshold: Duration,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        raw: RawConfigFile,
        max_duration: Option<Duration>,
        process_timeout: Duration,
        long_running_threshold: Duration,
    ) -> Self {
        Self {
            run: raw.run,
            runner: raw.runner,
            pool: raw.pool,
            retry: raw.retry,
            exit_codes: raw.exit_codes,
            report: raw.report,
            max_duration,
            process_timeout,
            long_running_threshold,
        }
    }

    /// Wall-clock budget for the whole run, if any.
    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration
    }

    /// Per-process budget enforced by the executor.
    pub fn process_timeout(&self) -> Duration {
        self.process_timeout
    }

    /// Running attempts older than this are counted as long-running in reports.
    pub fn long_running_threshold(&self) -> Duration {
        self.long_running_threshold
    }

    pub fn command_template(&self) -> CommandTemplate {
        CommandTemplate {
            bin: self.runner.bin.clone(),
            config: self.runner.config.clone(),
            flags: self.runner.flags.clone(),
            base_dir: self.runner.base_dir.clone(),
        }
    }
}

/// `[run]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    /// Glob selecting the feature files.
    #[serde(default = "default_src")]
    pub src: String,

    /// Log raw results, process errors and captured output after every attempt.
    #[serde(default)]
    pub debug: bool,

    /// Abort the whole run after this long (e.g. `"45m"`).
    #[serde(default)]
    pub max_duration: Option<String>,
}

fn default_src() -> String {
    "./**/*.feature".to_string()
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            src: default_src(),
            debug: false,
            max_duration: None,
        }
    }
}

/// `[runner]` section: how to invoke the external runner.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerSection {
    #[serde(default = "default_bin")]
    pub bin: String,

    /// Passed as `-c <config>` when set.
    #[serde(default = "default_runner_config")]
    pub config: Option<String>,

    #[serde(default)]
    pub flags: String,

    /// Prefix for every feature path on the command line.
    #[serde(default = "default_base_dir")]
    pub base_dir: String,

    /// Working directory of the spawned processes.
    #[serde(default = "default_cwd")]
    pub cwd: PathBuf,
}

fn default_bin() -> String {
    "./bin/behat".to_string()
}

fn default_runner_config() -> Option<String> {
    Some("./behat.yml".to_string())
}

fn default_base_dir() -> String {
    "./".to_string()
}

fn default_cwd() -> PathBuf {
    PathBuf::from("./")
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            bin: default_bin(),
            config: default_runner_config(),
            flags: String::new(),
            base_dir: default_base_dir(),
            cwd: default_cwd(),
        }
    }
}

/// `[pool]` section: executor limits.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolSection {
    #[serde(default = "default_max_processes")]
    pub max_processes: usize,

    /// Per-process wall-clock limit; the process is killed when it expires.
    #[serde(default = "default_process_timeout")]
    pub timeout: String,
}

fn default_max_processes() -> usize {
    10_000
}

fn default_process_timeout() -> String {
    "600s".to_string()
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            max_processes: default_max_processes(),
            timeout: default_process_timeout(),
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    /// Standard retry budget per feature.
    #[serde(default)]
    pub num_retries: u32,

    /// Environment timeouts absorbed by silent resubmission before the
    /// standard policy applies.
    #[serde(default = "default_environment_timeout_resubmits")]
    pub environment_timeout_resubmits: u32,

    /// Transport errors absorbed by silent resubmission before the
    /// standard policy applies.
    #[serde(default = "default_transport_error_resubmits")]
    pub transport_error_resubmits: u32,
}

fn default_environment_timeout_resubmits() -> u32 {
    1
}

fn default_transport_error_resubmits() -> u32 {
    5
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            num_retries: 0,
            environment_timeout_resubmits: default_environment_timeout_resubmits(),
            transport_error_resubmits: default_transport_error_resubmits(),
        }
    }
}

/// `[exit_codes]` section: what the runner's exit codes mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ExitCodeSection {
    #[serde(default = "default_environment_timeout_code")]
    pub environment_timeout: i32,
    #[serde(default = "default_transport_error_code")]
    pub transport_error: i32,
    #[serde(default = "default_scenario_failure_code")]
    pub scenario_failure: i32,
}

fn default_environment_timeout_code() -> i32 {
    13
}

fn default_transport_error_code() -> i32 {
    255
}

fn default_scenario_failure_code() -> i32 {
    1
}

impl Default for ExitCodeSection {
    fn default() -> Self {
        Self {
            environment_timeout: default_environment_timeout_code(),
            transport_error: default_transport_error_code(),
            scenario_failure: default_scenario_failure_code(),
        }
    }
}

/// `[report]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportSection {
    /// JSON snapshot path, rewritten after every lifecycle event.
    #[serde(default)]
    pub output: Option<PathBuf>,

    #[serde(default = "default_long_running_threshold")]
    pub long_running_threshold: String,
}

fn default_long_running_threshold() -> String {
    "120s".to_string()
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            output: None,
            long_running_threshold: default_long_running_threshold(),
        }
    }
}
