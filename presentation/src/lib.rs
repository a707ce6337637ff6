//! Presentation layer for consensus-server
//!
//! This crate contains the HTTP API (router, extractors, DTOs and error
//! rendering), CLI definitions and progress reporters.

pub mod api;
pub mod cli;
pub mod progress;

// Re-export commonly used types
pub use api::{AccountContext, ApiError, AppState, cors_layer, create_router};
pub use cli::Cli;
pub use progress::TracingProgress;
