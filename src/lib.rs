//! chronopool - in-process dispatch of work to bounded pools.
//!
//! Two surfaces share one work abstraction ([`WorkItem`]):
//!
//! - [`WorkerPool`]: a fixed number of workers draining a queue, with a
//!   graceful-then-forced shutdown.
//! - [`Scheduler`]: one-shot and fixed-rate periodic work at wall-clock
//!   instants, bounded by a resizable number of concurrent executions.
//!
//! Both run on the tokio runtime they are built in.

pub mod config;
pub mod core;
pub mod events;
pub mod execution;
pub mod scheduler;
pub mod testing;

pub use config::{ConfigError, DispatchConfig, SchedulerConfig, WorkerPoolConfig, YamlLoader};
pub use core::clock::{Clock, ManualClock, SystemClock};
pub use core::time_unit::{TimeUnit, TimeUnitError};
pub use core::types::{Lifecycle, TaskId};
pub use core::work::{SharedWork, WorkItem, blocking_fn, named_work_fn, work_fn};
pub use events::{Event, EventSink, NullSink, StdioSink, Stream};
pub use execution::{
    DEFAULT_GRACE_PERIOD, DEFAULT_POOL_CAPACITY, PoolError, WorkerPool, WorkerPoolBuilder,
};
pub use scheduler::{
    DEFAULT_SCHEDULER_CAPACITY, PAST_INSTANT_MESSAGE, Scheduler, SchedulerBuilder, SchedulerError,
};
