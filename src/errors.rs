// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::types::FeatureId;

#[derive(Error, Debug)]
pub enum BehatError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A feature attempt was driven through an illegal transition
    /// (e.g. completing an attempt that was never started).
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// An executor event referenced a feature the orchestrator never registered.
    #[error("Unknown feature id: {0}")]
    UnknownFeature(FeatureId),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid glob pattern: {0}")]
    GlobError(#[from] glob::PatternError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BehatError>;
