//! Firing loops for scheduled tasks.
//!
//! Each accepted task runs one of these loops as a tracked tokio task. A task
//! is pending while it sleeps toward its deadline or waits for a worker slot;
//! the `pending` token discards it only in that phase. Once an invocation has
//! started, only the `halt` token interrupts it.

use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::types::TaskId;
use crate::core::work::SharedWork;
use crate::execution::runner::{Outcome, run_guarded};
use crate::execution::slots::{WorkerPermit, WorkerSlots};

/// Fallback distance for deadlines that overflow the monotonic clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Everything a firing loop needs, detached from the scheduler.
pub(crate) struct Firing {
    pub(crate) task_id: TaskId,
    pub(crate) item: SharedWork,
    pub(crate) slots: Arc<WorkerSlots>,
    pub(crate) pending: CancellationToken,
    pub(crate) halt: CancellationToken,
    pub(crate) runtime: Handle,
}

/// Monotonic deadline `delay` from now.
pub(crate) fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay).unwrap_or_else(|| now + FAR_FUTURE)
}

impl Firing {
    /// Sleep until `deadline`, then wait for a worker slot.
    ///
    /// Returns `None` if the task is discarded first.
    async fn await_turn(&self, deadline: Instant) -> Option<WorkerPermit> {
        tokio::select! {
            biased;
            _ = self.pending.cancelled() => return None,
            _ = tokio::time::sleep_until(deadline) => {}
        }

        tokio::select! {
            biased;
            _ = self.pending.cancelled() => None,
            permit = self.slots.acquire() => Some(permit),
        }
    }

    async fn fire(&self, permit: WorkerPermit, firing: u64) {
        tracing::debug!(task_id = %self.task_id, item = self.item.name(), firing, "Firing task");

        let report = run_guarded(&self.item, &self.runtime, &self.halt).await;
        drop(permit);

        match report.outcome {
            Outcome::Completed => {
                tracing::debug!(task_id = %self.task_id, firing, duration = ?report.duration, "Task completed");
            }
            Outcome::Panicked => {
                tracing::warn!(task_id = %self.task_id, item = self.item.name(), firing, "Task panicked");
            }
            Outcome::Cancelled => {
                tracing::info!(task_id = %self.task_id, firing, "Task cancelled while running");
            }
        }
    }
}

/// Fire once at `deadline` unless discarded first.
pub(crate) async fn run_one_shot(firing: Firing, deadline: Instant) {
    match firing.await_turn(deadline).await {
        Some(permit) => firing.fire(permit, 1).await,
        None => {
            tracing::debug!(task_id = %firing.task_id, "One-shot task discarded before firing");
        }
    }
}

/// Fire at `first`, `first + period`, `first + 2 * period`, ... until discarded.
///
/// The next deadline is always derived from the previous deadline, never from
/// when the last invocation finished. An invocation that overruns its period
/// is followed immediately by the next one.
pub(crate) async fn run_periodic(firing: Firing, first: Instant, period: Duration) {
    let mut deadline = first;
    let mut count = 0u64;

    while let Some(permit) = firing.await_turn(deadline).await {
        count += 1;
        firing.fire(permit, count).await;

        match deadline.checked_add(period) {
            Some(next) => deadline = next,
            None => break,
        }
    }

    tracing::debug!(task_id = %firing.task_id, firings = count, "Periodic task finished");
}
