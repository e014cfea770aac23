//! Time-based scheduling of one-shot and periodic work.

mod engine;
mod task;
mod types;

pub use engine::{Scheduler, SchedulerBuilder};
pub use types::{DEFAULT_SCHEDULER_CAPACITY, PAST_INSTANT_MESSAGE, SchedulerError};
