//! Core identifier and state types.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier assigned to every task accepted by a scheduler.
///
/// Used to correlate log lines and diagnostic events; it is not a handle and
/// cannot be used to cancel the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a new random TaskId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a TaskId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a scheduler or worker pool.
///
/// Transitions only move forward: `Running` to `ShuttingDown` to `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Accepting new work.
    Running,
    /// No longer accepting work; previously accepted work may still run.
    ShuttingDown,
    /// Stopped and quiescent.
    Terminated,
}

impl Lifecycle {
    /// Check if new work is accepted in this state.
    pub fn accepts_work(&self) -> bool {
        matches!(self, Lifecycle::Running)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::Running => write!(f, "running"),
            Lifecycle::ShuttingDown => write!(f, "shutting down"),
            Lifecycle::Terminated => write!(f, "terminated"),
        }
    }
}
