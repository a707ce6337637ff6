//! Application-level configuration.
//!
//! - [`PipelineParams`]: quorum, call timeout and arbitration policy
//! - [`SchedulerParams`]: maintenance trigger timing and thresholds
//! - [`RegistryParams`]: job concurrency limits

pub mod pipeline_params;
pub mod scheduler_params;

pub use pipeline_params::{MAX_CALL_TIMEOUT, MIN_CALL_TIMEOUT, PipelineParams};
pub use scheduler_params::{RegistryParams, SchedulerParams};
