//! Guarded execution of a single work item.
//!
//! Each invocation runs in its own tokio task so a panicking item is caught
//! and reported instead of taking down the worker that invoked it.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::core::work::SharedWork;

/// How a single invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// The item returned.
    Completed,
    /// The item panicked.
    Panicked,
    /// The invocation was cancelled before the item returned.
    Cancelled,
}

/// Result of a single invocation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RunReport {
    pub(crate) outcome: Outcome,
    pub(crate) duration: Duration,
}

/// Run `item` once on `runtime`, cancelling it if `cancel` fires first.
///
/// After cancellation an interruptible invocation is aborted and awaited, so
/// an item that ignores cancellation still counts as running until it yields.
/// An item that is not interruptible is only awaited.
pub(crate) async fn run_guarded(
    item: &SharedWork,
    runtime: &Handle,
    cancel: &CancellationToken,
) -> RunReport {
    let start = Instant::now();
    let interruptible = item.is_interruptible();
    let item = Arc::clone(item);
    let mut handle = runtime.spawn(async move { item.run().await });

    let outcome = tokio::select! {
        result = &mut handle => match result {
            Ok(()) => Outcome::Completed,
            Err(e) if e.is_panic() => Outcome::Panicked,
            Err(_) => Outcome::Cancelled,
        },
        _ = cancel.cancelled() => {
            if interruptible {
                handle.abort();
            }
            match handle.await {
                Ok(()) => Outcome::Completed,
                Err(e) if e.is_panic() => Outcome::Panicked,
                Err(_) => Outcome::Cancelled,
            }
        }
    };

    RunReport {
        outcome,
        duration: start.elapsed(),
    }
}
