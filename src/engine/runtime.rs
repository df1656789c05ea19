// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::errors::{BehatError, Result};
use crate::exec::ExecutorBackend;
use crate::report::ReportWriter;

use super::core::BehatCore;
use super::{CompletionCallback, CoreCommand, LogSink, RunEvent, RunOutcome};

/// Drives a [`BehatCore`] with events from the executor and the host, and
/// carries out the commands it returns.
///
/// All run semantics live in the core; this type only does IO: it reads the
/// event channel, waits on the run deadline, talks to the executor, writes
/// report snapshots and forwards status lines to the log sink.
pub struct Runtime<E: ExecutorBackend> {
    core: BehatCore,
    event_rx: mpsc::Receiver<RunEvent>,
    executor: E,
    reporter: ReportWriter,
    log: LogSink,
    on_complete: Option<CompletionCallback>,
    deadline: Option<Instant>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("reporter", &self.reporter)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: BehatCore, event_rx: mpsc::Receiver<RunEvent>, executor: E) -> Self {
        Self {
            core,
            event_rx,
            executor,
            reporter: ReportWriter::disabled(),
            log: super::stdout_sink(),
            on_complete: None,
            deadline: None,
        }
    }

    pub fn with_reporter(mut self, reporter: ReportWriter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_log_sink(mut self, log: LogSink) -> Self {
        self.log = log;
        self
    }

    /// Register a callback fired exactly once when the run completes.
    pub fn on_complete(mut self, callback: CompletionCallback) -> Self {
        self.on_complete = Some(callback);
        self
    }

    /// Main event loop.
    ///
    /// - Submits every feature and starts the executor.
    /// - Feeds executor events and the deadline into the core.
    /// - Executes the commands returned by the core until it asks to stop.
    pub async fn run(mut self) -> Result<RunOutcome> {
        info!("parallel-behat runtime started");

        let step = self.core.begin()?;
        for command in step.commands {
            self.execute_command(command).await?;
        }

        loop {
            let deadline = self.deadline;
            let event = tokio::select! {
                maybe = self.event_rx.recv() => match maybe {
                    Some(event) => event,
                    None => {
                        return Err(BehatError::InvariantViolation(
                            "event channel closed before the run completed".to_string(),
                        ));
                    }
                },
                _ = wait_for_deadline(deadline) => {
                    self.deadline = None;
                    RunEvent::DeadlineElapsed
                }
            };

            debug!(event = event.kind(), "runtime received event");

            let step = self.core.step(event)?;
            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        info!("runtime exiting");
        Ok(self.core.outcome())
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::Log(line) => (self.log)(&line),
            CoreCommand::Submit(submission) => {
                debug!(feature = %submission.id, cmd = %submission.command, "submitting");
                self.executor.add_task(submission).await?;
            }
            CoreCommand::StartExecutor => self.executor.start().await?,
            CoreCommand::ArmDeadline(limit) => {
                debug!(?limit, "run deadline armed");
                self.deadline = Some(Instant::now() + limit);
            }
            CoreCommand::CancelDeadline => self.deadline = None,
            CoreCommand::WriteReport => self.write_report(),
            CoreCommand::TerminateAll => self.executor.terminate_tasks().await?,
            CoreCommand::Complete => {
                if let Some(callback) = self.on_complete.take() {
                    callback();
                }
            }
        }
        Ok(())
    }

    /// Report write failures are reported on the log sink and never end the run.
    fn write_report(&mut self) {
        let result = self.reporter.write(&self.core.report());
        if let Err(err) = result {
            let path = self
                .reporter
                .output()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            warn!(path = %path, error = %err, "failed to write report snapshot");
            (self.log)(&format!("[Error writing to logfile \"{path}\" -- {err}]"));
        }
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
