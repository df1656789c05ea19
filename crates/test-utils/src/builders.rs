#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use parallel_behat::config::{ConfigFile, RawConfigFile};
use parallel_behat::engine::{BehatCore, RunEvent, RunOptions, Runtime};
use parallel_behat::feature::CommandTemplate;
use parallel_behat::report::ReportWriter;

use crate::fake_executor::{ExecutorHandle, Outcome, ScriptedExecutor};
use crate::LogCapture;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn src(mut self, pattern: &str) -> Self {
        self.config.run.src = pattern.to_string();
        self
    }

    pub fn bin(mut self, bin: &str) -> Self {
        self.config.runner.bin = bin.to_string();
        self
    }

    pub fn runner_config(mut self, config: Option<&str>) -> Self {
        self.config.runner.config = config.map(str::to_string);
        self
    }

    pub fn base_dir(mut self, base_dir: &str) -> Self {
        self.config.runner.base_dir = base_dir.to_string();
        self
    }

    pub fn num_retries(mut self, n: u32) -> Self {
        self.config.retry.num_retries = n;
        self
    }

    pub fn max_processes(mut self, n: usize) -> Self {
        self.config.pool.max_processes = n;
        self
    }

    pub fn process_timeout(mut self, timeout: &str) -> Self {
        self.config.pool.timeout = timeout.to_string();
        self
    }

    pub fn max_duration(mut self, limit: &str) -> Self {
        self.config.run.max_duration = Some(limit.to_string());
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.report.output = Some(path.into());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a runtime test needs: the runtime itself plus the handles
/// that stay observable after it has run.
pub struct Harness {
    pub runtime: Runtime<ScriptedExecutor>,
    /// Extra sender into the runtime, e.g. for `ShutdownRequested`.
    pub events: mpsc::Sender<RunEvent>,
    pub logs: LogCapture,
    pub executor: ExecutorHandle,
    pub completions: Arc<AtomicUsize>,
}

/// Builds a [`Runtime`] over a [`ScriptedExecutor`].
///
/// Commands default to `behat   <file>` (no config, flags or base dir).
pub struct RuntimeBuilder {
    files: Vec<String>,
    template: CommandTemplate,
    options: RunOptions,
    reporter: ReportWriter,
    executor: ExecutorHandle,
}

impl RuntimeBuilder {
    pub fn new(files: &[&str]) -> Self {
        Self {
            files: files.iter().map(|f| f.to_string()).collect(),
            template: CommandTemplate {
                bin: "behat".to_string(),
                ..CommandTemplate::default()
            },
            options: RunOptions::default(),
            reporter: ReportWriter::disabled(),
            executor: ExecutorHandle::new(),
        }
    }

    pub fn options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn num_retries(mut self, n: u32) -> Self {
        self.options.num_retries = n;
        self
    }

    pub fn config(mut self, cfg: &ConfigFile) -> Self {
        self.template = cfg.command_template();
        self.options = RunOptions::from_config(cfg);
        self
    }

    pub fn reporter(mut self, reporter: ReportWriter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn script(self, file: &str, outcomes: Vec<Outcome>) -> Self {
        self.executor.script(file, outcomes);
        self
    }

    pub fn build(self) -> Harness {
        let (tx, rx) = mpsc::channel::<RunEvent>(256);
        let executor = ScriptedExecutor::new(tx.clone(), self.executor.clone());
        let core = BehatCore::new(self.files, self.template, self.options);

        let logs = LogCapture::new();
        let completions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&completions);

        let runtime = Runtime::new(core, rx, executor)
            .with_reporter(self.reporter)
            .with_log_sink(logs.sink())
            .on_complete(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));

        Harness {
            runtime,
            events: tx,
            logs,
            executor: self.executor,
            completions,
        }
    }
}
