//! In-process storage adapters
//!
//! The repositories keep everything in `DashMap`s. They honour the same
//! atomicity contract a document store would: closure updates for jobs,
//! version-checked writes for usage records and expiring leases.

mod lease;
mod memory;

pub use lease::MemoryLeaseManager;
pub use memory::{MemoryAccountRepository, MemoryJobRepository, MemoryUsageRepository};
