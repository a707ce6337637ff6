//! Progress reporting for running jobs

mod tracing_progress;

pub use tracing_progress::TracingProgress;
