//! Diagnostic events and sinks.
//!
//! Pools and schedulers report the few human-facing diagnostics they have
//! through an [`EventSink`], so applications can redirect them and tests can
//! assert on them without capturing process streams.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::core::types::TaskId;

/// Output stream an event is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Diagnostic events.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A periodic task was accepted.
    PeriodicScheduled {
        task_id: TaskId,
        /// Wall-clock instant of the first firing.
        first_fire: DateTime<Utc>,
        /// Effective period after millisecond truncation.
        period: Duration,
    },

    /// A worker pool did not terminate within both grace windows.
    PoolShutdownIncomplete {
        capacity: usize,
        /// Workers still alive when the pool gave up waiting.
        workers_remaining: usize,
        grace_period: Duration,
    },
}

impl Event {
    /// Create a PeriodicScheduled event.
    pub fn periodic_scheduled(task_id: TaskId, first_fire: DateTime<Utc>, period: Duration) -> Self {
        Event::PeriodicScheduled {
            task_id,
            first_fire,
            period,
        }
    }

    /// Create a PoolShutdownIncomplete event.
    pub fn pool_shutdown_incomplete(
        capacity: usize,
        workers_remaining: usize,
        grace_period: Duration,
    ) -> Self {
        Event::PoolShutdownIncomplete {
            capacity,
            workers_remaining,
            grace_period,
        }
    }

    /// The stream this event is written to by [`StdioSink`].
    pub fn stream(&self) -> Stream {
        match self {
            Event::PeriodicScheduled { .. } => Stream::Stdout,
            Event::PoolShutdownIncomplete { .. } => Stream::Stderr,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::PeriodicScheduled {
                task_id,
                first_fire,
                period,
            } => write!(
                f,
                "Scheduling periodic task {} for {} (every {:?})",
                task_id,
                first_fire.to_rfc3339(),
                period
            ),
            Event::PoolShutdownIncomplete {
                capacity,
                workers_remaining,
                grace_period,
            } => write!(
                f,
                "Worker pool failed to shut down: {} of {} worker(s) still running after 2 x {:?}",
                workers_remaining, capacity, grace_period
            ),
        }
    }
}

/// Receiver of diagnostic events.
pub trait EventSink: Send + Sync {
    /// Handle an event. Called synchronously on the emitting path.
    fn emit(&self, event: &Event);
}

/// Writes each event as one line to stdout or stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioSink;

impl EventSink for StdioSink {
    fn emit(&self, event: &Event) {
        match event.stream() {
            Stream::Stdout => println!("{}", event),
            Stream::Stderr => eprintln!("{}", event),
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &Event) {}
}

/// The sink used when none is configured.
pub fn default_sink() -> Arc<dyn EventSink> {
    Arc::new(StdioSink)
}
