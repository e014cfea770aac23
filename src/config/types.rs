//! Configuration type definitions.
//!
//! Durations are written as human strings such as `"60s"` or `"1m30s"`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::time_unit::{TimeUnit, duration_str};
use crate::execution::{DEFAULT_GRACE_PERIOD, DEFAULT_POOL_CAPACITY};
use crate::scheduler::DEFAULT_SCHEDULER_CAPACITY;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Time-based scheduler settings.
    pub scheduler: SchedulerConfig,
    /// Worker pool settings.
    pub worker_pool: WorkerPoolConfig,
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum concurrent executions.
    pub capacity: usize,
    /// Unit for periods submitted without one.
    pub time_unit: TimeUnit,
    /// Keep firing periodic tasks after `stop`.
    pub continue_periodic_after_stop: bool,
    /// Emit a diagnostic line when a periodic task is accepted.
    pub announce_periodic: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_SCHEDULER_CAPACITY,
            time_unit: TimeUnit::Seconds,
            continue_periodic_after_stop: false,
            announce_periodic: true,
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Number of workers.
    pub capacity: usize,
    /// Length of each shutdown wait.
    #[serde(with = "duration_str")]
    pub grace_period: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_POOL_CAPACITY,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}
