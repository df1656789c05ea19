use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use parallel_behat::engine::RunEvent;
use parallel_behat::errors::{BehatError, Result};
use parallel_behat::exec::{BackendFuture, ExecutorBackend};
use parallel_behat::types::{FeatureId, ProcessError, Submission};

/// What a scripted process does when it runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Exit with `error` (`None` = exit 0) and the given output.
    Finish {
        error: Option<ProcessError>,
        stdout: String,
    },
    /// Start and never finish.
    Hang,
}

impl Outcome {
    /// Exit 0 with a summary block ending in `summary`.
    pub fn passed(summary: &str) -> Self {
        Outcome::Finish {
            error: None,
            stdout: summary_block(summary),
        }
    }

    /// Exit 0 without any output.
    pub fn success() -> Self {
        Outcome::Finish {
            error: None,
            stdout: String::new(),
        }
    }

    pub fn exit(code: i32) -> Self {
        Outcome::Finish {
            error: Some(ProcessError::exit_code(code)),
            stdout: String::new(),
        }
    }

    /// Exit with `code` and a summary block ending in `summary`.
    pub fn exit_with(code: i32, summary: &str) -> Self {
        Outcome::Finish {
            error: Some(ProcessError::exit_code(code)),
            stdout: summary_block(summary),
        }
    }

    pub fn killed() -> Self {
        Outcome::Finish {
            error: Some(ProcessError::killed()),
            stdout: String::new(),
        }
    }

    pub fn hang() -> Self {
        Outcome::Hang
    }
}

/// Runner-style output tail: scenario line, steps line, elapsed time.
pub fn summary_block(summary: &str) -> String {
    format!("{summary}\n5 steps (5 passed)\n0m1.00s\n")
}

#[derive(Debug, Default)]
struct State {
    submissions: Vec<Submission>,
    terminations: usize,
    scripts: Vec<(String, VecDeque<Outcome>)>,
}

/// Shared view of a [`ScriptedExecutor`], kept by the test after the
/// executor moves into the runtime.
#[derive(Debug, Clone, Default)]
pub struct ExecutorHandle {
    state: Arc<Mutex<State>>,
}

impl ExecutorHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the runs of every command ending in `suffix`, in order. The
    /// last outcome repeats once the list is exhausted.
    pub fn script(&self, suffix: &str, outcomes: Vec<Outcome>) {
        let mut state = self.state.lock().unwrap();
        state.scripts.push((suffix.to_string(), outcomes.into()));
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn submitted_ids(&self) -> Vec<FeatureId> {
        self.submissions().into_iter().map(|s| s.id).collect()
    }

    /// How many times `id` was handed to the executor.
    pub fn submission_count(&self, id: FeatureId) -> usize {
        self.submissions().iter().filter(|s| s.id == id).count()
    }

    pub fn terminations(&self) -> usize {
        self.state.lock().unwrap().terminations
    }

    fn next_outcome(&self, command: &str) -> Outcome {
        let mut state = self.state.lock().unwrap();
        let script = state
            .scripts
            .iter_mut()
            .find(|(suffix, _)| command.ends_with(suffix.as_str()));
        match script {
            Some((_, outcomes)) if outcomes.len() > 1 => outcomes.pop_front().unwrap(),
            Some((_, outcomes)) => outcomes.front().cloned().unwrap_or_else(Outcome::success),
            None => Outcome::success(),
        }
    }
}

/// A deterministic in-process executor.
///
/// - Submissions added before `start` are queued and run in order by `start`.
/// - After `start`, each submission runs synchronously inside `add_task`.
/// - Every run sends `TaskStarted` then (unless scripted to hang)
///   `TaskFinished`, and `AllFinished` when nothing is left outstanding.
///
/// Events go into the runtime's own channel while the runtime is busy, so
/// that channel needs room for a few events per feature.
pub struct ScriptedExecutor {
    runtime_tx: mpsc::Sender<RunEvent>,
    handle: ExecutorHandle,
    queued: Vec<Submission>,
    started: bool,
    terminated: bool,
    outstanding: usize,
}

impl ScriptedExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RunEvent>, handle: ExecutorHandle) -> Self {
        Self {
            runtime_tx,
            handle,
            queued: Vec::new(),
            started: false,
            terminated: false,
            outstanding: 0,
        }
    }

    async fn send(&self, event: RunEvent) -> Result<()> {
        self.runtime_tx
            .send(event)
            .await
            .map_err(|e| BehatError::Other(anyhow::anyhow!("runtime channel closed: {e}")))
    }

    async fn run(&mut self, submission: Submission) -> Result<()> {
        let id = submission.id;
        self.send(RunEvent::TaskStarted { id }).await?;

        match self.handle.next_outcome(&submission.command) {
            Outcome::Hang => Ok(()),
            Outcome::Finish { error, stdout } => {
                self.send(RunEvent::TaskFinished {
                    id,
                    error,
                    stdout,
                    stderr: String::new(),
                })
                .await?;
                self.outstanding -= 1;
                self.notify_if_idle().await
            }
        }
    }

    async fn notify_if_idle(&self) -> Result<()> {
        if self.outstanding == 0 && !self.terminated {
            self.send(RunEvent::AllFinished).await?;
        }
        Ok(())
    }
}

impl ExecutorBackend for ScriptedExecutor {
    fn add_task(&mut self, submission: Submission) -> BackendFuture<'_> {
        Box::pin(async move {
            self.handle
                .state
                .lock()
                .unwrap()
                .submissions
                .push(submission.clone());

            if self.terminated {
                return Ok(());
            }
            if !self.started {
                self.queued.push(submission);
                return Ok(());
            }
            self.outstanding += 1;
            self.run(submission).await
        })
    }

    fn start(&mut self) -> BackendFuture<'_> {
        Box::pin(async move {
            self.started = true;
            let queued = std::mem::take(&mut self.queued);
            self.outstanding += queued.len();
            if queued.is_empty() {
                return self.notify_if_idle().await;
            }
            for submission in queued {
                if self.terminated {
                    break;
                }
                self.run(submission).await?;
            }
            Ok(())
        })
    }

    fn terminate_tasks(&mut self) -> BackendFuture<'_> {
        Box::pin(async move {
            self.terminated = true;
            self.queued.clear();
            self.handle.state.lock().unwrap().terminations += 1;
            Ok(())
        })
    }
}
