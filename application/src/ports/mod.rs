//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod audit_log;
pub mod lease;
pub mod notifier;
pub mod progress;
pub mod provider;
pub mod repository;
pub mod tier_catalog;
