// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - `model.rs` defines the TOML-backed data model.
//! - `loader.rs` reads a config file from disk.
//! - `validate.rs` turns a raw config into a checked [`ConfigFile`].
//! - `duration.rs` parses `"30s"`-style durations.

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{
    ConfigFile, ExitCodeSection, PoolSection, RawConfigFile, ReportSection, RetrySection,
    RunSection, RunnerSection,
};
pub use validate::validate_config;
