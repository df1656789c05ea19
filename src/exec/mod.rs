// src/exec/mod.rs

//! Process execution layer.
//!
//! Runs runner commands with `tokio::process::Command` and reports back to
//! the orchestration runtime via `RunEvent`s.
//!
//! - [`backend`] provides the `ExecutorBackend` trait and the production
//!   `RealExecutorBackend`, which tests replace with a scripted executor.
//! - [`pool`] owns the queue and the bounded set of running processes.
//! - [`process`] runs a single submission and captures its output.

pub mod backend;
pub mod pool;
pub mod process;

pub use backend::{BackendFuture, ExecutorBackend, RealExecutorBackend};
pub use pool::{spawn_pool, PoolMessage, PoolSettings};
