//! fairgrid-core: types shared by the allocation engine and its harness.
//!
//! - **`resource`**: the two-dimensional resource vector (memory, vcores)
//! - **`types`**: attempt/container ids, priorities, locality levels, requests
//! - **`config`**: scheduler-wide knobs that drive delay scheduling

pub mod config;
pub mod resource;
pub mod types;

pub use config::{ConfigError, ConfigResult, LocalityMode, SchedulerConfig};
pub use resource::{Resource, ResourceWeights};
pub use types::*;
