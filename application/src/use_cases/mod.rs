//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod job_registry;
pub mod provider_roster;
pub mod run_consensus;
pub mod scheduler;
pub mod usage_ledger;
