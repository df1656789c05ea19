// src/exec/pool.rs

//! Background loop that runs submissions with bounded parallelism.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::config::ConfigFile;
use crate::engine::RunEvent;
use crate::exec::process::run_process;
use crate::types::{FeatureId, Submission};

/// Limits applied to every spawned process.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_processes: usize,
    /// Wall-clock limit per process; it is killed when this expires.
    pub timeout: Duration,
    /// Working directory of the spawned shells.
    pub cwd: PathBuf,
}

impl PoolSettings {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self {
            max_processes: cfg.pool.max_processes,
            timeout: cfg.process_timeout(),
            cwd: cfg.runner.cwd.clone(),
        }
    }
}

#[derive(Debug)]
pub enum PoolMessage {
    Add(Submission),
    Start,
    TerminateAll,
}

/// Handle for a running process.
///
/// Keyed by a per-spawn slot number rather than the feature id: a feature
/// can be resubmitted before the pool hears that its previous process ended.
struct ActiveProcess {
    id: FeatureId,
    cancel: Option<oneshot::Sender<()>>,
}

/// Spawn the background pool loop and return its message sender.
pub fn spawn_pool(
    settings: PoolSettings,
    runtime_tx: mpsc::Sender<RunEvent>,
) -> mpsc::Sender<PoolMessage> {
    let (tx, rx) = mpsc::channel::<PoolMessage>(256);
    let (done_tx, done_rx) = mpsc::unbounded_channel::<u64>();

    let pool = Pool {
        settings: Arc::new(settings),
        runtime_tx,
        done_tx,
        queue: VecDeque::new(),
        active: HashMap::new(),
        next_slot: 0,
        started: false,
        terminated: false,
    };
    tokio::spawn(pool.run(rx, done_rx));

    tx
}

struct Pool {
    settings: Arc<PoolSettings>,
    runtime_tx: mpsc::Sender<RunEvent>,
    done_tx: mpsc::UnboundedSender<u64>,
    queue: VecDeque<Submission>,
    active: HashMap<u64, ActiveProcess>,
    next_slot: u64,
    started: bool,
    terminated: bool,
}

impl Pool {
    async fn run(
        mut self,
        mut rx: mpsc::Receiver<PoolMessage>,
        mut done_rx: mpsc::UnboundedReceiver<u64>,
    ) {
        info!(max_processes = self.settings.max_processes, "process pool started");

        loop {
            tokio::select! {
                message = rx.recv() => match message {
                    Some(PoolMessage::Add(submission)) => self.add(submission),
                    Some(PoolMessage::Start) => {
                        self.started = true;
                        self.fill();
                        self.notify_if_idle().await;
                    }
                    Some(PoolMessage::TerminateAll) => self.terminate_all(),
                    None => break,
                },
                Some(slot) = done_rx.recv() => {
                    if let Some(process) = self.active.remove(&slot) {
                        debug!(slot, feature = %process.id, "process slot released");
                    }
                    self.fill();
                    self.notify_if_idle().await;
                }
            }
        }

        info!("process pool finished (channel closed)");
    }

    fn add(&mut self, submission: Submission) {
        if self.terminated {
            debug!(feature = %submission.id, "pool terminated; dropping submission");
            return;
        }
        self.queue.push_back(submission);
        self.fill();
    }

    /// Start queued submissions while there is capacity.
    fn fill(&mut self) {
        if !self.started || self.terminated {
            return;
        }
        while self.active.len() < self.settings.max_processes {
            let Some(submission) = self.queue.pop_front() else {
                break;
            };
            self.spawn(submission);
        }
    }

    fn spawn(&mut self, submission: Submission) {
        let slot = self.next_slot;
        self.next_slot += 1;

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let id = submission.id;
        let settings = Arc::clone(&self.settings);
        let runtime_tx = self.runtime_tx.clone();
        let done_tx = self.done_tx.clone();

        tokio::spawn(async move {
            run_process(submission, &settings, &runtime_tx, cancel_rx).await;
            let _ = done_tx.send(slot);
        });

        self.active.insert(
            slot,
            ActiveProcess {
                id,
                cancel: Some(cancel_tx),
            },
        );
    }

    fn terminate_all(&mut self) {
        info!(
            queued = self.queue.len(),
            running = self.active.len(),
            "terminating all submissions"
        );
        self.terminated = true;
        self.queue.clear();
        for (slot, process) in self.active.iter_mut() {
            if let Some(cancel) = process.cancel.take() {
                if cancel.send(()).is_err() {
                    debug!(slot, feature = %process.id, "process already finished while cancelling");
                }
            }
        }
    }

    async fn notify_if_idle(&self) {
        if !self.started || self.terminated || !self.queue.is_empty() || !self.active.is_empty() {
            return;
        }
        debug!("pool idle");
        if self.runtime_tx.send(RunEvent::AllFinished).await.is_err() {
            debug!("runtime gone; dropping all-finished notification");
        }
    }
}
