//! Core domain concepts shared across all subdomains.
//!
//! - [`provider::ProviderId`]: identifier of an external LLM provider
//! - [`input::ConsensusInput`]: a validated topic plus ordered sources
//! - [`error::DomainError`]: domain-level errors

pub mod error;
pub mod input;
pub mod provider;
