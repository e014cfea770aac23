//! Configuration loading and parsing.
//!
//! This module provides YAML-based configuration for the scheduler and the
//! worker pool.

mod error;
mod types;
mod yaml;

pub use error::ConfigError;
pub use types::{DispatchConfig, SchedulerConfig, WorkerPoolConfig};
pub use yaml::YamlLoader;
