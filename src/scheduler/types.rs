//! Scheduler type definitions.
//!
//! This module contains the error type and constants for the scheduler.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Number of concurrent executions used when none is given.
pub const DEFAULT_SCHEDULER_CAPACITY: usize = 10;

/// Message carried by every past-instant rejection.
pub const PAST_INSTANT_MESSAGE: &str = "the time for scheduling cannot be before the present";

/// Errors that can occur in the scheduler.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// An argument was out of range: a target instant not after now, a zero
    /// capacity, or a period shorter than one millisecond.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Every worker was busy at submission time.
    #[error("rejected: {running} of {capacity} workers busy")]
    Rejected { running: usize, capacity: usize },

    /// The scheduler has been stopped.
    #[error("scheduler is not running")]
    NotRunning,

    /// Built outside a tokio runtime without an explicit handle.
    #[error("no tokio runtime available to run scheduled work")]
    NoRuntime,
}

impl SchedulerError {
    pub(crate) fn past_instant(target: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        SchedulerError::InvalidArgument(format!(
            "{} ({} is not after {})",
            PAST_INSTANT_MESSAGE,
            target.to_rfc3339(),
            now.to_rfc3339()
        ))
    }

    pub(crate) fn zero_capacity() -> Self {
        SchedulerError::InvalidArgument("capacity must be positive".to_string())
    }

    /// Check if this error reports a target instant that was not in the future.
    pub fn is_past_instant(&self) -> bool {
        matches!(self, SchedulerError::InvalidArgument(msg) if msg.contains(PAST_INSTANT_MESSAGE))
    }

    /// Check if this error reports a saturated scheduler.
    pub fn is_rejected(&self) -> bool {
        matches!(self, SchedulerError::Rejected { .. })
    }
}
