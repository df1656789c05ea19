// src/engine/core.rs

//! Pure core orchestrator state machine.
//!
//! [`BehatCore`] consumes [`RunEvent`]s and produces:
//! - updated feature state
//! - a list of [`CoreCommand`]s describing what the IO shell should do next
//!
//! It has no channels, no Tokio types, and performs no IO, so every retry and
//! completion rule can be unit tested by feeding it events directly.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::duration::format_minutes_seconds;
use crate::engine::event_handlers::{handle_task_finished, handle_task_started};
use crate::engine::{AbortReason, CoreCommand, CoreStep, RunEvent, RunOptions, RunOutcome};
use crate::errors::{BehatError, Result};
use crate::feature::{CommandTemplate, FeatureTask};
use crate::report::{ReportTotals, RunReport};
use crate::types::{FeatureId, Submission};

/// All features of one run, addressed by [`FeatureId`].
///
/// Also tracks which features have a submission the executor has not yet
/// finished, which is what decides whether an `AllFinished` is final.
#[derive(Debug, Default)]
pub struct FeatureRegistry {
    features: Vec<FeatureTask>,
    in_flight: BTreeSet<FeatureId>,
}

impl FeatureRegistry {
    /// Register a feature and return its first submission.
    pub fn register(&mut self, filename: &str, command: String) -> CoreCommand {
        let id = FeatureId(self.features.len() + 1);
        self.features.push(FeatureTask::new(id, filename, command));
        self.in_flight.insert(id);
        CoreCommand::Submit(Submission {
            id,
            command: self.features[id.0 - 1].command().to_string(),
        })
    }

    pub fn get(&self, id: FeatureId) -> Result<&FeatureTask> {
        id.0.checked_sub(1)
            .and_then(|idx| self.features.get(idx))
            .ok_or(BehatError::UnknownFeature(id))
    }

    pub fn get_mut(&mut self, id: FeatureId) -> Result<&mut FeatureTask> {
        id.0.checked_sub(1)
            .and_then(|idx| self.features.get_mut(idx))
            .ok_or(BehatError::UnknownFeature(id))
    }

    /// Put a feature back on the executor queue.
    pub fn resubmit(&mut self, id: FeatureId) -> Result<CoreCommand> {
        let command = self.get(id)?.command().to_string();
        self.in_flight.insert(id);
        Ok(CoreCommand::Submit(Submission { id, command }))
    }

    /// Record that the executor finished the outstanding submission of `id`.
    pub fn finish_submission(&mut self, id: FeatureId) {
        if !self.in_flight.remove(&id) {
            debug!(feature = %id, "finished event without an outstanding submission");
        }
    }

    pub fn features(&self) -> &[FeatureTask] {
        &self.features
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Run-wide clock, set when the run begins.
#[derive(Debug, Clone, Copy)]
struct RunClock {
    started: Instant,
    started_at: DateTime<Utc>,
}

impl RunClock {
    fn now() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }
}

/// The orchestrator for one run.
#[derive(Debug)]
pub struct BehatCore {
    files: Vec<String>,
    template: CommandTemplate,
    options: RunOptions,
    registry: FeatureRegistry,
    clock: Option<RunClock>,
    completed: bool,
    aborted: Option<AbortReason>,
}

impl BehatCore {
    pub fn new(files: Vec<String>, template: CommandTemplate, options: RunOptions) -> Self {
        Self {
            files,
            template,
            options,
            registry: FeatureRegistry::default(),
            clock: None,
            completed: false,
            aborted: None,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn features(&self) -> &[FeatureTask] {
        self.registry.features()
    }

    pub fn feature(&self, id: FeatureId) -> Result<&FeatureTask> {
        self.registry.get(id)
    }

    /// Look a feature up by its file name.
    pub fn feature_by_file(&self, filename: &str) -> Option<&FeatureTask> {
        self.features().iter().find(|f| f.filename() == filename)
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn elapsed(&self) -> Duration {
        self.clock
            .map(|c| c.started.elapsed())
            .unwrap_or_default()
    }

    /// Register every file, submit it, arm the deadline and start the executor.
    pub fn begin(&mut self) -> Result<CoreStep> {
        if self.clock.is_some() {
            return Err(BehatError::InvariantViolation(
                "begin() called twice for the same run".to_string(),
            ));
        }
        self.clock = Some(RunClock::now());

        let mut commands = vec![CoreCommand::Log(format!(
            "Found {} feature file(s). Running {} at a time.",
            self.files.len(),
            self.options.max_processes
        ))];

        for file in &self.files {
            let command = self.template.file_to_command(file);
            commands.push(self.registry.register(file, command));
        }

        if let Some(limit) = self.options.max_duration {
            commands.push(CoreCommand::ArmDeadline(limit));
        }
        commands.push(CoreCommand::StartExecutor);

        info!(
            features = self.registry.len(),
            num_retries = self.options.num_retries,
            "run started"
        );
        Ok(CoreStep::continue_with(commands))
    }

    /// Handle a single event, updating state and returning commands for the
    /// IO shell.
    ///
    /// Errors are invariant violations or routing defects and are fatal.
    pub fn step(&mut self, event: RunEvent) -> Result<CoreStep> {
        if self.completed {
            debug!(event = event.kind(), "run already complete; ignoring event");
            return Ok(CoreStep::finish_with(Vec::new()));
        }

        match event {
            RunEvent::TaskStarted { id } => {
                handle_task_started(&mut self.registry, id).map(CoreStep::continue_with)
            }
            RunEvent::TaskFinished {
                id,
                error,
                stdout,
                stderr,
            } => handle_task_finished(&mut self.registry, &self.options, id, error, &stdout, &stderr)
                .map(CoreStep::continue_with),
            RunEvent::AllFinished => Ok(self.handle_all_finished()),
            RunEvent::DeadlineElapsed => Ok(self.abort(AbortReason::Deadline)),
            RunEvent::ShutdownRequested => Ok(self.abort(AbortReason::Interrupted)),
        }
    }

    fn handle_all_finished(&mut self) -> CoreStep {
        let outstanding = self.registry.in_flight();
        if outstanding > 0 {
            debug!(outstanding, "executor idle while resubmissions are outstanding; waiting");
            return CoreStep::continue_with(Vec::new());
        }

        self.completed = true;
        let totals = self.totals();
        info!(?totals, "run finished");

        CoreStep::finish_with(vec![
            CoreCommand::CancelDeadline,
            CoreCommand::Log(format!(
                "Finished in {}",
                format_minutes_seconds(self.elapsed())
            )),
            CoreCommand::Log(format!(
                "{} of {} feature(s) ok, {} retr{}, {} with problems",
                totals.ok,
                totals.total,
                totals.retries,
                if totals.retries == 1 { "y" } else { "ies" },
                totals.problems
            )),
            CoreCommand::WriteReport,
            CoreCommand::Complete,
        ])
    }

    fn abort(&mut self, reason: AbortReason) -> CoreStep {
        self.completed = true;
        self.aborted = Some(reason);
        let unresolved = self.registry.in_flight();
        info!(?reason, unresolved, "run aborted");

        CoreStep::finish_with(vec![
            CoreCommand::CancelDeadline,
            CoreCommand::Log(format!(
                "{} after {}: {} of {} feature(s) unresolved",
                reason,
                format_minutes_seconds(self.elapsed()),
                unresolved,
                self.registry.len()
            )),
            CoreCommand::TerminateAll,
            CoreCommand::WriteReport,
            CoreCommand::Complete,
        ])
    }

    pub fn totals(&self) -> ReportTotals {
        ReportTotals::compute(
            self.registry.features(),
            self.options.long_running_threshold,
            self.registry.in_flight(),
        )
    }

    /// Snapshot of the current state for the report writer.
    pub fn report(&self) -> RunReport<'_> {
        let started_at = self.clock.map(|c| c.started_at).unwrap_or_else(Utc::now);
        RunReport::new(
            started_at,
            self.elapsed(),
            self.aborted.is_some(),
            self.registry.features(),
            self.options.long_running_threshold,
            self.registry.in_flight(),
        )
    }

    pub fn outcome(&self) -> RunOutcome {
        RunOutcome {
            aborted: self.aborted,
            elapsed: self.elapsed(),
            totals: self.totals(),
            features: self.registry.features().to_vec(),
        }
    }
}
