//! Testing utilities for users of the chronopool library.
//!
//! This module provides helpers for testing timed dispatch:
//!
//! - [`RecordingSink`]: An event sink that keeps every event it receives
//! - [`ProbeWork`]: A work item that records when it fired and how many of
//!   its invocations overlapped

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::core::work::WorkItem;
use crate::events::{Event, EventSink, Stream};

/// An event sink that records events instead of printing them.
///
/// # Example
///
/// ```
/// use chronopool::testing::RecordingSink;
/// use chronopool::{Event, EventSink, TaskId};
/// use std::time::Duration;
///
/// let sink = RecordingSink::new();
/// let event = Event::periodic_scheduled(TaskId::new(), chrono::Utc::now(), Duration::from_secs(1));
/// sink.emit(&event);
///
/// assert_eq!(sink.events(), vec![event]);
/// ```
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All events received so far, oldest first.
    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    /// Rendered lines that would have gone to `stream`.
    pub fn lines(&self, stream: Stream) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|event| event.stream() == stream)
            .map(ToString::to_string)
            .collect()
    }

    /// Forget every recorded event.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &Event) {
        self.lock().push(event.clone());
    }
}

#[derive(Debug, Clone, Copy)]
enum Body {
    Immediate,
    Sleep(Duration),
    Forever,
}

#[derive(Debug, Default)]
struct ProbeState {
    fired: Vec<Instant>,
    active: usize,
    max_active: usize,
    completed: usize,
}

/// A work item that records its own invocations.
///
/// Fire instants are taken from tokio's clock, so they line up with paused
/// time in tests. The body either returns at once, sleeps for a fixed time,
/// or never returns.
#[derive(Debug)]
pub struct ProbeWork {
    name: String,
    body: Body,
    state: Mutex<ProbeState>,
}

impl ProbeWork {
    fn with_body(body: Body) -> Arc<Self> {
        Arc::new(Self {
            name: "probe".to_string(),
            body,
            state: Mutex::new(ProbeState::default()),
        })
    }

    /// A probe whose body returns immediately.
    pub fn new() -> Arc<Self> {
        Self::with_body(Body::Immediate)
    }

    /// A probe whose body sleeps for `duration`.
    pub fn with_duration(duration: Duration) -> Arc<Self> {
        Self::with_body(Body::Sleep(duration))
    }

    /// A probe whose body never returns unless cancelled.
    pub fn forever() -> Arc<Self> {
        Self::with_body(Body::Forever)
    }

    fn state(&self) -> MutexGuard<'_, ProbeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of invocations started.
    pub fn fire_count(&self) -> usize {
        self.state().fired.len()
    }

    /// Instants at which invocations started, oldest first.
    pub fn fire_times(&self) -> Vec<Instant> {
        self.state().fired.clone()
    }

    /// Number of invocations that returned normally.
    pub fn completed_count(&self) -> usize {
        self.state().completed
    }

    /// Highest number of invocations that were in progress at once.
    pub fn max_concurrency(&self) -> usize {
        self.state().max_active
    }

    /// Check if an invocation is in progress.
    pub fn is_running(&self) -> bool {
        self.state().active > 0
    }
}

/// Marks an invocation finished even if its future is dropped.
struct Active<'a>(&'a ProbeWork);

impl Drop for Active<'_> {
    fn drop(&mut self) {
        let mut state = self.0.state();
        state.active = state.active.saturating_sub(1);
    }
}

#[async_trait]
impl WorkItem for ProbeWork {
    async fn run(&self) {
        {
            let mut state = self.state();
            state.fired.push(Instant::now());
            state.active += 1;
            state.max_active = state.max_active.max(state.active);
        }
        let _active = Active(self);

        match self.body {
            Body::Immediate => {}
            Body::Sleep(duration) => tokio::time::sleep(duration).await,
            Body::Forever => std::future::pending::<()>().await,
        }

        self.state().completed += 1;
    }

    fn name(&self) -> &str {
        &self.name
    }
}
