//! Provider adapter port
//!
//! Defines the interface for calling one external language-model provider.

use async_trait::async_trait;
use consensus_domain::{Prompt, ProviderFailureKind, ProviderId};
use thiserror::Error;

/// Successful provider response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    /// Input plus output tokens reported by the provider
    pub tokens_used: u64,
}

impl Completion {
    pub fn new(text: impl Into<String>, tokens_used: u64) -> Self {
        Self {
            text: text.into(),
            tokens_used,
        }
    }
}

/// Errors that can occur during a provider call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Timeout")]
    Timeout,

    /// The provider answered but the answer is unusable. `tokens_used` is
    /// whatever the provider reported billing for the call, if anything.
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String, tokens_used: u64 },

    #[error("Transport error: {0}")]
    TransportError(String),
}

impl ProviderError {
    /// Unusable answer with no billed usage
    pub fn invalid_response(message: impl Into<String>) -> Self {
        ProviderError::InvalidResponse {
            message: message.into(),
            tokens_used: 0,
        }
    }

    pub fn kind(&self) -> ProviderFailureKind {
        match self {
            ProviderError::RateLimited(_) => ProviderFailureKind::RateLimited,
            ProviderError::Timeout => ProviderFailureKind::Timeout,
            ProviderError::InvalidResponse { .. } => ProviderFailureKind::InvalidResponse,
            ProviderError::TransportError(_) => ProviderFailureKind::TransportError,
        }
    }

    /// Tokens the provider billed even though the call failed
    pub fn tokens_used(&self) -> u64 {
        match self {
            ProviderError::InvalidResponse { tokens_used, .. } => *tokens_used,
            _ => 0,
        }
    }

    /// Transient failures may succeed if the call is repeated later
    pub fn is_transient(&self) -> bool {
        self.kind().is_transient()
    }
}

/// Uniform interface to one external LLM provider
///
/// Implementations (adapters) live in the infrastructure layer. An adapter
/// performs exactly one request per `invoke` and never retries on its own;
/// retry decisions belong to the pipeline.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Identifier this adapter is registered under
    fn id(&self) -> &ProviderId;

    /// Send `prompt` and return the response text with its token usage
    async fn invoke(&self, prompt: &Prompt) -> Result<Completion, ProviderError>;
}
