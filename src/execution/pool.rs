//! Fixed-size worker pool.
//!
//! The `WorkerPool` runs submitted items on a fixed number of workers fed by
//! an unbounded queue. Shutdown is two-phase:
//! - stop accepting and let queued and running items finish, for up to one
//!   grace period;
//! - then cancel running items, drop queued ones, and wait one more grace
//!   period before reporting failure.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::WorkerPoolConfig;
use crate::core::types::Lifecycle;
use crate::core::work::SharedWork;
use crate::events::{Event, EventSink, default_sink};

use super::runner::{Outcome, run_guarded};

/// Number of workers used when none is given.
pub const DEFAULT_POOL_CAPACITY: usize = 15;

/// Length of each of the two shutdown waits.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(60);

type Queue = Arc<AsyncMutex<mpsc::UnboundedReceiver<SharedWork>>>;

/// Errors that can occur in the worker pool.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// The pool has been shut down.
    #[error("worker pool is not running")]
    NotRunning,

    /// Zero workers requested.
    #[error("worker pool capacity must be positive")]
    InvalidCapacity,

    /// Built outside a tokio runtime without an explicit handle.
    #[error("no tokio runtime available to run workers")]
    NoRuntime,
}

/// Builder for [`WorkerPool`].
pub struct WorkerPoolBuilder {
    capacity: usize,
    grace_period: Duration,
    events: Arc<dyn EventSink>,
    runtime: Option<Handle>,
}

impl Default for WorkerPoolBuilder {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_POOL_CAPACITY,
            grace_period: DEFAULT_GRACE_PERIOD,
            events: default_sink(),
            runtime: None,
        }
    }
}

impl WorkerPoolBuilder {
    /// Set the number of workers.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the length of each shutdown wait.
    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Set the sink for diagnostic events.
    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Run workers on the given runtime instead of the current one.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Start the workers.
    pub fn build(self) -> Result<WorkerPool, PoolError> {
        if self.capacity == 0 {
            return Err(PoolError::InvalidCapacity);
        }
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| PoolError::NoRuntime)?,
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        let queue: Queue = Arc::new(AsyncMutex::new(receiver));
        let workers = TaskTracker::new();
        let cancel = CancellationToken::new();

        for worker in 0..self.capacity {
            workers.spawn_on(
                worker_loop(
                    worker,
                    Arc::clone(&queue),
                    cancel.clone(),
                    runtime.clone(),
                ),
                &runtime,
            );
        }

        tracing::info!(
            capacity = self.capacity,
            grace_period = ?self.grace_period,
            "Worker pool started"
        );

        Ok(WorkerPool {
            capacity: self.capacity,
            grace_period: self.grace_period,
            sender: Mutex::new(Some(sender)),
            queue,
            workers,
            cancel,
            events: self.events,
        })
    }
}

/// A fixed-size pool of workers.
pub struct WorkerPool {
    capacity: usize,
    grace_period: Duration,
    /// `None` once shutdown has begun.
    sender: Mutex<Option<mpsc::UnboundedSender<SharedWork>>>,
    queue: Queue,
    workers: TaskTracker,
    cancel: CancellationToken,
    events: Arc<dyn EventSink>,
}

impl WorkerPool {
    /// Create a pool with `capacity` workers on the current runtime.
    pub fn new(capacity: usize) -> Result<Self, PoolError> {
        Self::builder().capacity(capacity).build()
    }

    /// Start building a pool with the default capacity and grace period.
    pub fn builder() -> WorkerPoolBuilder {
        WorkerPoolBuilder::default()
    }

    /// Create a pool from configuration.
    pub fn from_config(config: &WorkerPoolConfig) -> Result<Self, PoolError> {
        Self::builder()
            .capacity(config.capacity)
            .grace_period(config.grace_period)
            .build()
    }

    fn sender(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<SharedWork>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of workers.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Length of each shutdown wait.
    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Queue one item. Returns immediately.
    pub fn submit(&self, item: SharedWork) -> Result<(), PoolError> {
        let sender = self.sender();
        let sender = sender.as_ref().ok_or(PoolError::NotRunning)?;
        sender.send(item).map_err(|_| PoolError::NotRunning)
    }

    /// Queue several items in iteration order.
    ///
    /// Stops at the first item that cannot be queued.
    pub fn submit_many<I>(&self, items: I) -> Result<(), PoolError>
    where
        I: IntoIterator<Item = SharedWork>,
    {
        for item in items {
            self.submit(item)?;
        }
        Ok(())
    }

    /// Stop accepting new items and wait for the pool to drain.
    ///
    /// Waits up to one grace period for queued and running items. If workers
    /// are still busy, running items are cancelled, queued items are dropped,
    /// and the pool waits one more grace period. If it still has not
    /// terminated a `PoolShutdownIncomplete` event is emitted.
    ///
    /// If this future is dropped before it resolves, the pool is cancelled
    /// immediately.
    ///
    /// Returns whether the pool terminated.
    pub async fn shutdown(&self) -> bool {
        self.close();
        let interrupted = self.cancel.clone().drop_guard();

        tracing::info!(
            workers = self.workers.len(),
            grace_period = ?self.grace_period,
            "Worker pool shutting down"
        );

        let terminated = if self.await_termination(self.grace_period).await {
            true
        } else {
            tracing::warn!(
                workers = self.workers.len(),
                grace_period = ?self.grace_period,
                "Worker pool did not drain within grace period, cancelling running work"
            );
            self.force_cancel();

            if self.await_termination(self.grace_period).await {
                true
            } else {
                let remaining = self.workers.len();
                tracing::error!(
                    workers = remaining,
                    "Worker pool failed to terminate after forced cancellation"
                );
                self.events.emit(&Event::pool_shutdown_incomplete(
                    self.capacity,
                    remaining,
                    self.grace_period,
                ));
                false
            }
        };

        interrupted.disarm();
        if terminated {
            tracing::info!("Worker pool terminated");
        }
        terminated
    }

    /// Wait up to `timeout` for the pool to terminate.
    ///
    /// Returns false straight after the timeout if shutdown was never started.
    pub async fn await_termination(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.workers.wait())
            .await
            .is_ok()
    }

    /// Check if shutdown has begun.
    pub fn is_shutdown(&self) -> bool {
        self.sender().is_none()
    }

    /// Check if shutdown has begun and every worker has exited.
    pub fn is_terminated(&self) -> bool {
        self.workers.is_closed() && self.workers.is_empty()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> Lifecycle {
        if !self.is_shutdown() {
            Lifecycle::Running
        } else if self.workers.is_empty() {
            Lifecycle::Terminated
        } else {
            Lifecycle::ShuttingDown
        }
    }

    fn close(&self) {
        if self.sender().take().is_some() {
            self.workers.close();
        }
    }

    fn force_cancel(&self) {
        self.cancel.cancel();
        if let Ok(mut queue) = self.queue.try_lock() {
            let mut dropped = 0usize;
            while queue.try_recv().is_ok() {
                dropped += 1;
            }
            if dropped > 0 {
                tracing::warn!(dropped, "Dropped queued work items that never started");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn next_item(queue: &Queue) -> Option<SharedWork> {
    queue.lock().await.recv().await
}

async fn worker_loop(worker: usize, queue: Queue, cancel: CancellationToken, runtime: Handle) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            item = next_item(&queue) => item,
        };
        let Some(item) = next else {
            break;
        };

        let report = run_guarded(&item, &runtime, &cancel).await;
        match report.outcome {
            Outcome::Completed => {
                tracing::debug!(worker, item = item.name(), duration = ?report.duration, "Work item completed");
            }
            Outcome::Panicked => {
                tracing::warn!(worker, item = item.name(), "Work item panicked");
            }
            Outcome::Cancelled => {
                tracing::debug!(worker, item = item.name(), "Work item cancelled");
            }
        }
    }
    tracing::debug!(worker, "Worker exited");
}
