//! The unit of work accepted by pools and schedulers.
//!
//! A [`WorkItem`] is an opaque, argument-less procedure. Pools and schedulers
//! never look at what it does; they only decide when and where it runs. Items
//! are shared as [`SharedWork`] because a periodic task invokes the same item
//! many times.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// An item of work.
///
/// # Example
///
/// ```ignore
/// use chronopool::WorkItem;
/// use async_trait::async_trait;
///
/// struct Heartbeat;
///
/// #[async_trait]
/// impl WorkItem for Heartbeat {
///     async fn run(&self) {
///         tracing::info!("still alive");
///     }
/// }
/// ```
///
/// Forced cancellation drops the future returned by `run` at its next await
/// point. Items that block a thread without awaiting cannot be cancelled.
#[async_trait]
pub trait WorkItem: Send + Sync + 'static {
    /// Perform the work once.
    async fn run(&self);

    /// Name used in log lines.
    fn name(&self) -> &str {
        "work"
    }

    /// Whether forced cancellation may drop `run` before it returns.
    ///
    /// Items whose work continues elsewhere after their future is dropped,
    /// such as on a blocking thread, return false. Forced cancellation then
    /// waits for them, so they keep their worker until the work is done.
    fn is_interruptible(&self) -> bool {
        true
    }
}

/// A work item shared between its submitter and the executor.
pub type SharedWork = Arc<dyn WorkItem>;

/// Work item backed by an async closure.
pub struct FnWork<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F, Fut> WorkItem for FnWork<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn run(&self) {
        (self.f)().await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Work item backed by a synchronous closure, run on tokio's blocking pool.
pub struct BlockingWork<F> {
    name: String,
    f: Arc<F>,
}

#[async_trait]
impl<F> WorkItem for BlockingWork<F>
where
    F: Fn() + Send + Sync + 'static,
{
    async fn run(&self) {
        let f = Arc::clone(&self.f);
        if let Err(e) = tokio::task::spawn_blocking(move || f()).await
            && e.is_panic()
        {
            std::panic::resume_unwind(e.into_panic());
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_interruptible(&self) -> bool {
        false
    }
}

/// Wrap an async closure as shared work.
pub fn work_fn<F, Fut>(f: F) -> SharedWork
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    named_work_fn("work", f)
}

/// Wrap an async closure as shared work with a name for log lines.
pub fn named_work_fn<F, Fut>(name: impl Into<String>, f: F) -> SharedWork
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(FnWork {
        name: name.into(),
        f,
    })
}

/// Wrap a synchronous closure as shared work.
///
/// The closure runs on the blocking thread pool and cannot be interrupted:
/// forced cancellation waits for it to return.
pub fn blocking_fn<F>(f: F) -> SharedWork
where
    F: Fn() + Send + Sync + 'static,
{
    Arc::new(BlockingWork {
        name: "blocking-work".to_string(),
        f: Arc::new(f),
    })
}
