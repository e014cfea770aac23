//! Core building blocks shared by the pool and the scheduler.

pub mod clock;
pub mod time_unit;
pub mod types;
pub mod work;
