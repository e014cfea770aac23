//! Execution infrastructure.
//!
//! This module provides the fixed-size worker pool, the resizable worker
//! slots that bound scheduler concurrency, and guarded invocation of work
//! items.

mod pool;
pub(crate) mod runner;
pub(crate) mod slots;

pub use pool::{DEFAULT_GRACE_PERIOD, DEFAULT_POOL_CAPACITY, PoolError, WorkerPool, WorkerPoolBuilder};
