// src/engine/mod.rs

//! Orchestration engine.
//!
//! The pure core state machine lives in [`core`] with its per-event logic in
//! [`event_handlers`]; the async/IO shell that feeds it executor events and
//! carries out its commands is [`runtime`].

use std::fmt;
use std::time::Duration;

use crate::config::{ConfigFile, ExitCodeSection};
use crate::feature::FeatureTask;
use crate::report::ReportTotals;
use crate::types::{FeatureId, ProcessError, Submission};

pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use self::core::BehatCore;
pub use event_handlers::{classify, Classification};
pub use runtime::Runtime;

/// Receives every human-readable status line, in order.
pub type LogSink = Box<dyn FnMut(&str) + Send>;

/// Invoked once when the run completes, normally or by abort.
pub type CompletionCallback = Box<dyn FnOnce() + Send>;

/// Sink that prints status lines to stdout.
pub fn stdout_sink() -> LogSink {
    Box::new(|line| println!("{line}"))
}

/// Events flowing into the runtime from the executor and the host.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// The executor started a process for this feature.
    TaskStarted { id: FeatureId },
    /// The process for this feature exited (or could not be run).
    TaskFinished {
        id: FeatureId,
        error: Option<ProcessError>,
        stdout: String,
        stderr: String,
    },
    /// The executor has nothing queued or running.
    AllFinished,
    /// The configured maximum run duration elapsed.
    DeadlineElapsed,
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

impl RunEvent {
    /// Short label for tracing, without captured output.
    pub fn kind(&self) -> &'static str {
        match self {
            RunEvent::TaskStarted { .. } => "task_started",
            RunEvent::TaskFinished { .. } => "task_finished",
            RunEvent::AllFinished => "all_finished",
            RunEvent::DeadlineElapsed => "deadline_elapsed",
            RunEvent::ShutdownRequested => "shutdown_requested",
        }
    }
}

/// Why a run stopped before the executor drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    Deadline,
    Interrupted,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Deadline => write!(f, "Aborting"),
            AbortReason::Interrupted => write!(f, "Interrupted"),
        }
    }
}

/// Knobs for a single run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Shown in the opening status line; the executor enforces it.
    pub max_processes: usize,
    /// Standard retry budget per feature.
    pub num_retries: u32,
    pub environment_timeout_resubmits: u32,
    pub transport_error_resubmits: u32,
    pub exit_codes: ExitCodeSection,
    pub max_duration: Option<Duration>,
    pub long_running_threshold: Duration,
    /// Log raw results and captured output after every attempt.
    pub debug: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_processes: 10_000,
            num_retries: 0,
            environment_timeout_resubmits: 1,
            transport_error_resubmits: 5,
            exit_codes: ExitCodeSection::default(),
            max_duration: None,
            long_running_threshold: Duration::from_secs(120),
            debug: false,
        }
    }
}

impl RunOptions {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self {
            max_processes: cfg.pool.max_processes,
            num_retries: cfg.retry.num_retries,
            environment_timeout_resubmits: cfg.retry.environment_timeout_resubmits,
            transport_error_resubmits: cfg.retry.transport_error_resubmits,
            exit_codes: cfg.exit_codes,
            max_duration: cfg.max_duration(),
            long_running_threshold: cfg.long_running_threshold(),
            debug: cfg.run.debug,
        }
    }
}

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreCommand {
    /// Emit a status line on the log sink.
    Log(String),
    /// Hand a submission to the executor.
    Submit(Submission),
    /// Let the executor begin running submissions.
    StartExecutor,
    /// Arm the one-shot run deadline.
    ArmDeadline(Duration),
    CancelDeadline,
    /// Persist a report snapshot of the current state.
    WriteReport,
    /// Tell the executor to drop queued work and kill running processes.
    TerminateAll,
    /// Fire the completion callback and stop the runtime.
    Complete,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone, Default)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub fn continue_with(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    pub fn finish_with(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: false,
        }
    }
}

/// Final state of a run, returned by [`Runtime::run`].
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub aborted: Option<AbortReason>,
    pub elapsed: Duration,
    pub totals: ReportTotals,
    pub features: Vec<FeatureTask>,
}

impl RunOutcome {
    /// True when the run drained and every feature ended ok.
    pub fn all_ok(&self) -> bool {
        self.aborted.is_none() && self.features.iter().all(|f| f.is_ok())
    }
}
