// src/types.rs

//! Small value types shared between the orchestrator and executors.

use std::fmt;

use serde::Serialize;

/// Routing key for a feature file within a single run.
///
/// Ids are assigned in submission order starting at 1, so they double as
/// the short tag shown in status lines (`[3] login.feature`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FeatureId(pub usize);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of work handed to an executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub id: FeatureId,
    pub command: String,
}

/// Why a finished process is considered to have failed.
///
/// Absent (`None` on the finished event) when the process exited with 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessError {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// The executor killed the process after its wall-clock timeout.
    pub killed: bool,
    /// Extra detail, e.g. a spawn failure.
    pub message: Option<String>,
}

impl ProcessError {
    pub fn exit_code(code: i32) -> Self {
        Self {
            code: Some(code),
            ..Self::default()
        }
    }

    pub fn killed() -> Self {
        Self {
            killed: true,
            ..Self::default()
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.killed {
            write!(f, "killed")?;
        } else if let Some(code) = self.code {
            write!(f, "exit code {code}")?;
        } else {
            write!(f, "process error")?;
        }
        if let Some(ref msg) = self.message {
            write!(f, " ({msg})")?;
        }
        Ok(())
    }
}
