// src/feature/task.rs

//! Per-feature attempt bookkeeping.
//!
//! A [`FeatureTask`] lives for the whole run and records every attempt made
//! at its feature file. Attempts move through:
//!
//! ```text
//! not started -> running -> succeeded | failed | forceKillTimeout | unknown
//! ```
//!
//! An environment timeout or transport error does not close the running
//! attempt; it removes it, as if the attempt had never happened, and bumps a
//! dedicated counter instead.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::{BehatError, Result};
use crate::feature::scenarios::ScenarioResult;
use crate::types::FeatureId;

/// Terminal status of a closed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AttemptStatus {
    Succeeded,
    Failed,
    ForceKillTimeout,
    Unknown,
}

impl AttemptStatus {
    /// Statuses that say nothing about the feature itself.
    pub fn is_problem(self) -> bool {
        matches!(self, AttemptStatus::ForceKillTimeout | AttemptStatus::Unknown)
    }
}

/// One execution try of a feature.
#[derive(Debug, Clone, Serialize)]
pub struct Attempt {
    started_at: DateTime<Utc>,
    #[serde(skip)]
    started: Instant,
    ended_at: Option<DateTime<Utc>>,
    duration_secs: Option<f64>,
    status: Option<AttemptStatus>,
    scenarios: Option<ScenarioResult>,
}

impl Attempt {
    fn open() -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
            ended_at: None,
            duration_secs: None,
            status: None,
            scenarios: None,
        }
    }

    fn close(&mut self, status: AttemptStatus, scenarios: Option<ScenarioResult>) {
        self.ended_at = Some(Utc::now());
        self.duration_secs = Some(self.started.elapsed().as_secs_f64());
        self.status = Some(status);
        self.scenarios = scenarios;
    }

    pub fn is_open(&self) -> bool {
        self.status.is_none()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.duration_secs
    }

    pub fn status(&self) -> Option<AttemptStatus> {
        self.status
    }

    pub fn scenarios(&self) -> Option<&ScenarioResult> {
        self.scenarios.as_ref()
    }
}

/// Everything known about one feature file during a run.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureTask {
    id: FeatureId,
    filename: String,
    descriptor: String,
    command: String,
    attempts: Vec<Attempt>,
    retries: u32,
    running: bool,
    ok: bool,
    environment_timeouts: u32,
    transport_errors: u32,
}

impl FeatureTask {
    pub fn new(id: FeatureId, filename: impl Into<String>, command: impl Into<String>) -> Self {
        let filename = filename.into();
        Self {
            id,
            descriptor: format!("[{id}] {filename}"),
            filename,
            command: command.into(),
            attempts: Vec::new(),
            retries: 0,
            running: false,
            ok: false,
            environment_timeouts: 0,
            transport_errors: 0,
        }
    }

    pub fn id(&self) -> FeatureId {
        self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// `[<id>] <filename>`, used in every status line.
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    pub fn environment_timeouts(&self) -> u32 {
        self.environment_timeouts
    }

    pub fn transport_errors(&self) -> u32 {
        self.transport_errors
    }

    fn open_attempt(&self) -> Option<&Attempt> {
        self.attempts.last().filter(|a| a.is_open())
    }

    fn open_attempt_mut(&mut self, op: &str) -> Result<&mut Attempt> {
        let descriptor = &self.descriptor;
        self.attempts
            .last_mut()
            .filter(|a| a.is_open())
            .ok_or_else(|| {
                BehatError::InvariantViolation(format!(
                    "{op}() on {descriptor} without an open attempt"
                ))
            })
    }

    /// Open a new attempt.
    pub fn start(&mut self) -> Result<()> {
        if self.open_attempt().is_some() {
            return Err(BehatError::InvariantViolation(format!(
                "start() on {} while an attempt is already open",
                self.descriptor
            )));
        }
        self.attempts.push(Attempt::open());
        self.running = true;
        Ok(())
    }

    fn set_completion(
        &mut self,
        op: &str,
        status: AttemptStatus,
        scenarios: Option<ScenarioResult>,
    ) -> Result<()> {
        self.open_attempt_mut(op)?.close(status, scenarios);
        self.running = false;
        Ok(())
    }

    pub fn succeeded(&mut self, scenarios: Option<ScenarioResult>) -> Result<()> {
        self.set_completion("succeeded", AttemptStatus::Succeeded, scenarios)?;
        self.ok = true;
        Ok(())
    }

    pub fn failed(&mut self, scenarios: Option<ScenarioResult>) -> Result<()> {
        self.set_completion("failed", AttemptStatus::Failed, scenarios)
    }

    pub fn force_kill_timeout(&mut self) -> Result<()> {
        self.set_completion("forceKillTimeout", AttemptStatus::ForceKillTimeout, None)
    }

    pub fn unknown(&mut self) -> Result<()> {
        self.set_completion("unknown", AttemptStatus::Unknown, None)
    }

    fn discard_open_attempt(&mut self, op: &str) -> Result<()> {
        self.open_attempt_mut(op)?;
        self.attempts.pop();
        self.running = false;
        Ok(())
    }

    /// Drop the running attempt after an environment (selenium) timeout.
    pub fn selenium_timeout(&mut self) -> Result<()> {
        self.discard_open_attempt("seleniumTimeout")?;
        self.environment_timeouts += 1;
        Ok(())
    }

    /// Drop the running attempt after a transient transport error.
    pub fn transport_error(&mut self) -> Result<()> {
        self.discard_open_attempt("transportError")?;
        self.transport_errors += 1;
        Ok(())
    }

    pub fn requeue(&mut self) {
        self.retries += 1;
    }

    /// Status of the most recent closed attempt.
    pub fn status(&self) -> Option<AttemptStatus> {
        self.attempts.iter().rev().find_map(|a| a.status())
    }

    /// Whole seconds the current attempt has been running, 0 when idle.
    pub fn current_duration(&self) -> u64 {
        if !self.running {
            return 0;
        }
        self.open_attempt()
            .map(|a| a.started.elapsed().as_secs())
            .unwrap_or(0)
    }

    /// True when the feature has only ever been killed or errored out.
    pub fn has_problems(&self) -> bool {
        let mut closed = self.attempts.iter().filter_map(|a| a.status()).peekable();
        if self.running || closed.peek().is_none() {
            return false;
        }
        closed.all(AttemptStatus::is_problem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn started() -> FeatureTask {
        let mut task = FeatureTask::new(FeatureId(1), "awesome.feature", "behat   awesome.feature");
        task.start().unwrap();
        task
    }

    fn passed(n: u32) -> ScenarioResult {
        ScenarioResult {
            counts: [("passed".to_string(), n)].into_iter().collect(),
            total: n,
        }
    }

    #[test]
    fn new_task_is_idle() {
        let task = FeatureTask::new(FeatureId(7), "awesome.feature", "cmd");
        assert_eq!(task.filename(), "awesome.feature");
        assert_eq!(task.descriptor(), "[7] awesome.feature");
        assert!(task.attempts().is_empty());
        assert!(!task.is_ok());
        assert_eq!(task.retries(), 0);
        assert!(!task.is_running());
        assert_eq!(task.status(), None);
    }

    #[test]
    fn start_opens_attempt() {
        let task = started();
        assert!(task.is_running());
        assert_eq!(task.attempts().len(), 1);
        assert!(task.attempts()[0].is_open());
        assert_eq!(task.attempts()[0].duration_secs(), None);
    }

    #[test]
    fn start_twice_is_an_invariant_violation() {
        let mut task = started();
        assert!(matches!(task.start(), Err(BehatError::InvariantViolation(_))));
        assert_eq!(task.attempts().len(), 1);
    }

    #[test]
    fn succeeded_closes_attempt_and_sets_ok() {
        let mut task = started();
        task.succeeded(Some(passed(3))).unwrap();

        assert!(!task.is_running());
        assert!(task.is_ok());
        let attempt = &task.attempts()[0];
        assert_eq!(attempt.status(), Some(AttemptStatus::Succeeded));
        assert!(attempt.duration_secs().is_some());
        assert!(attempt.ended_at().is_some());
        assert_eq!(attempt.scenarios(), Some(&passed(3)));
    }

    #[test]
    fn closing_twice_is_an_invariant_violation() {
        let mut task = started();
        task.failed(None).unwrap();
        assert!(matches!(task.failed(None), Err(BehatError::InvariantViolation(_))));
        assert!(matches!(task.unknown(), Err(BehatError::InvariantViolation(_))));
        assert!(matches!(
            task.selenium_timeout(),
            Err(BehatError::InvariantViolation(_))
        ));
        assert_eq!(task.status(), Some(AttemptStatus::Failed));
    }

    #[test]
    fn completing_before_start_is_an_invariant_violation() {
        let mut task = FeatureTask::new(FeatureId(1), "a.feature", "cmd");
        assert!(matches!(
            task.succeeded(None),
            Err(BehatError::InvariantViolation(_))
        ));
        assert!(!task.is_ok());
    }

    #[test]
    fn attempts_are_kept_in_order() {
        let mut task = started();
        task.failed(None).unwrap();
        task.start().unwrap();
        task.force_kill_timeout().unwrap();

        let statuses: Vec<_> = task.attempts().iter().map(|a| a.status()).collect();
        assert_eq!(
            statuses,
            vec![Some(AttemptStatus::Failed), Some(AttemptStatus::ForceKillTimeout)]
        );
        assert!(task.attempts()[1].started_at() >= task.attempts()[0].started_at());
        assert_eq!(task.status(), Some(AttemptStatus::ForceKillTimeout));
    }

    #[test]
    fn selenium_timeout_discards_attempt() {
        let mut task = started();
        task.selenium_timeout().unwrap();
        assert!(task.attempts().is_empty());
        assert_eq!(task.environment_timeouts(), 1);
        assert_eq!(task.retries(), 0);
        assert!(!task.is_running());
    }

    #[test]
    fn transport_error_discards_attempt() {
        let mut task = started();
        task.transport_error().unwrap();
        assert!(task.attempts().is_empty());
        assert_eq!(task.transport_errors(), 1);
        assert!(!task.is_running());
    }

    #[test]
    fn requeue_counts_retries() {
        let mut task = started();
        task.requeue();
        assert_eq!(task.retries(), 1);
        task.requeue();
        assert_eq!(task.retries(), 2);
    }

    #[test]
    fn status_ignores_open_attempt() {
        let mut task = started();
        task.failed(None).unwrap();
        task.start().unwrap();
        assert_eq!(task.status(), Some(AttemptStatus::Failed));
    }

    #[test]
    fn current_duration_when_idle_is_zero() {
        let task = FeatureTask::new(FeatureId(1), "a.feature", "cmd");
        assert_eq!(task.current_duration(), 0);
        assert_eq!(task.current_duration(), 0);

        let mut task = started();
        task.succeeded(None).unwrap();
        assert_eq!(task.current_duration(), 0);
    }

    #[test]
    fn current_duration_while_running() {
        let mut task = started();
        let backdated = Instant::now()
            .checked_sub(Duration::from_secs(2))
            .expect("monotonic clock is past two seconds");
        task.attempts[0].started = backdated;
        assert_eq!(task.current_duration(), 2);
    }

    #[test]
    fn has_problems_requires_only_problem_attempts() {
        let task = FeatureTask::new(FeatureId(1), "a.feature", "cmd");
        assert!(!task.has_problems(), "no attempts");

        let mut task = started();
        assert!(!task.has_problems(), "running");
        task.force_kill_timeout().unwrap();
        assert!(task.has_problems());
        task.start().unwrap();
        task.unknown().unwrap();
        assert!(task.has_problems());
        task.start().unwrap();
        assert!(!task.has_problems(), "running again");
        task.failed(None).unwrap();
        assert!(!task.has_problems(), "a failed attempt says something real");
    }

    #[test]
    fn has_problems_false_after_success() {
        let mut task = started();
        task.unknown().unwrap();
        task.start().unwrap();
        task.succeeded(None).unwrap();
        assert!(!task.has_problems());
    }

    #[test]
    fn serializes_camel_case_status() {
        let mut task = started();
        task.force_kill_timeout().unwrap();
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["attempts"][0]["status"], "forceKillTimeout");
        assert_eq!(json["descriptor"], "[1] awesome.feature");
        assert!(json["attempts"][0].get("started").is_none());
    }
}
