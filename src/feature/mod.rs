// src/feature/mod.rs

//! Feature files and their per-run records.
//!
//! - [`command`] renders the runner invocation for a file.
//! - [`scenarios`] parses the runner's scenario summary line.
//! - [`task`] holds the per-feature attempt state machine.

pub mod command;
pub mod scenarios;
pub mod task;

pub use command::CommandTemplate;
pub use scenarios::{locate_summary, parse_scenarios, ScenarioResult, SummaryLines};
pub use task::{Attempt, AttemptStatus, FeatureTask};
