// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of a raw mpsc sender,
//! so tests can swap in a scripted executor while production uses the
//! process pool in [`super::pool`].

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::engine::RunEvent;
use crate::errors::{BehatError, Result};
use crate::types::Submission;

use super::pool::{spawn_pool, PoolMessage, PoolSettings};

pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// What the orchestrator needs from an executor.
///
/// Implementations report progress by sending [`RunEvent`]s:
/// `TaskStarted` then `TaskFinished` for every submission, and `AllFinished`
/// every time they become idle after `start`.
pub trait ExecutorBackend: Send {
    /// Queue a submission. Before `start` it only waits in the queue.
    fn add_task(&mut self, submission: Submission) -> BackendFuture<'_>;

    /// Begin running queued submissions.
    fn start(&mut self) -> BackendFuture<'_>;

    /// Drop queued submissions and kill running processes.
    fn terminate_tasks(&mut self) -> BackendFuture<'_>;
}

/// Real executor backend used in production: forwards to the background
/// process pool.
#[derive(Debug)]
pub struct RealExecutorBackend {
    tx: mpsc::Sender<PoolMessage>,
}

impl RealExecutorBackend {
    /// Spawn the process pool immediately, wired to the runtime event sender.
    pub fn new(settings: PoolSettings, runtime_tx: mpsc::Sender<RunEvent>) -> Self {
        let tx = spawn_pool(settings, runtime_tx);
        Self { tx }
    }

    fn send(&self, message: PoolMessage) -> BackendFuture<'static> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();
        Box::pin(async move {
            tx.send(message)
                .await
                .map_err(|e| BehatError::Other(anyhow::anyhow!("process pool stopped: {e}")))
        })
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn add_task(&mut self, submission: Submission) -> BackendFuture<'_> {
        self.send(PoolMessage::Add(submission))
    }

    fn start(&mut self) -> BackendFuture<'_> {
        self.send(PoolMessage::Start)
    }

    fn terminate_tasks(&mut self) -> BackendFuture<'_> {
        self.send(PoolMessage::TerminateAll)
    }
}
