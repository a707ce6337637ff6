//! Domain layer for consensus-server
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Consensus pipeline
//!
//! A [`Job`] fans a topic out to several providers and moves through three
//! phases: independent drafting, peer review and final arbitration. The
//! [`JobState`] machine only moves forward; `Failed` is reachable from every
//! non-terminal state.
//!
//! ## Metering
//!
//! Every job is estimated up front ([`estimate_tokens`]), admitted against
//! the account's remaining allowance ([`check_availability`]) and charged by
//! its actual token usage into a per-period [`UsageRecord`].

pub mod billing;
pub mod consensus;
pub mod core;
pub mod estimate;
pub mod prompt;

// Re-export commonly used types
pub use billing::{
    Account, AccountId, AvailabilityCheck, BillingType, SubscriptionTier, UsageRecord,
    UsageSummary, check_availability,
};
pub use consensus::{
    confidence::confidence,
    job::{Job, JobId},
    phase::{JobState, JobStatus, Phase},
    review_plan::{ReviewAssignment, assign_reviewers},
    value_objects::{
        ConsensusArtifact, DraftReview, FailureCode, FailureReason, PhaseResult, PhaseTokens,
        ProviderFailureKind, ProviderOutput,
    },
};
pub use crate::core::{
    error::DomainError,
    input::{ConsensusInput, Depth, GenerationOptions},
    provider::ProviderId,
};
pub use estimate::{TokenEstimate, estimate_for_input, estimate_tokens};
pub use prompt::{Prompt, PromptTemplate};
