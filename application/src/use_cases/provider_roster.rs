//! Provider roster
//!
//! Holds the configured provider adapters in roster order and turns a single
//! adapter call into a [`ProviderOutput`]: the per-call timeout is applied
//! here so every adapter behaves the same when it stalls, and errors are
//! classified instead of propagated.

use crate::ports::provider::{ProviderAdapter, ProviderError};
use consensus_domain::{Prompt, ProviderId, ProviderOutput};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    #[error("No providers configured")]
    Empty,

    #[error("Provider registered twice: {0}")]
    Duplicate(ProviderId),
}

/// Ordered set of provider adapters
#[derive(Clone)]
pub struct ProviderRoster {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    call_timeout: Duration,
}

impl ProviderRoster {
    pub fn new(
        adapters: Vec<Arc<dyn ProviderAdapter>>,
        call_timeout: Duration,
    ) -> Result<Self, RosterError> {
        if adapters.is_empty() {
            return Err(RosterError::Empty);
        }
        for (i, adapter) in adapters.iter().enumerate() {
            if adapters[..i].iter().any(|a| a.id() == adapter.id()) {
                return Err(RosterError::Duplicate(adapter.id().clone()));
            }
        }
        Ok(Self {
            adapters,
            call_timeout,
        })
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Provider ids in roster order
    pub fn ids(&self) -> Vec<ProviderId> {
        self.adapters.iter().map(|a| a.id().clone()).collect()
    }

    pub fn adapters(&self) -> &[Arc<dyn ProviderAdapter>] {
        &self.adapters
    }

    pub fn get(&self, id: &ProviderId) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.iter().find(|a| a.id() == id).cloned()
    }

    /// Call one adapter with this roster's timeout.
    pub async fn call(&self, adapter: Arc<dyn ProviderAdapter>, prompt: Prompt) -> ProviderOutput {
        invoke_with_timeout(adapter, prompt, self.call_timeout).await
    }
}

/// Invoke `adapter` once, bounded by `timeout`, and record the outcome.
///
/// Owns its arguments so it can be spawned onto a `JoinSet`.
pub async fn invoke_with_timeout(
    adapter: Arc<dyn ProviderAdapter>,
    prompt: Prompt,
    timeout: Duration,
) -> ProviderOutput {
    let provider = adapter.id().clone();
    let started = Instant::now();
    let result = match tokio::time::timeout(timeout, adapter.invoke(&prompt)).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout),
    };
    let latency_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(completion) => {
            debug!(
                provider = %provider,
                tokens = completion.tokens_used,
                latency_ms,
                "Provider call succeeded"
            );
            ProviderOutput::success(provider, completion.text, completion.tokens_used, latency_ms)
        }
        Err(e) => {
            let tokens_used = e.tokens_used();
            warn!(
                provider = %provider,
                latency_ms,
                tokens = tokens_used,
                error = %e,
                "Provider call failed"
            );
            ProviderOutput::failure(provider, e.kind(), e.to_string(), tokens_used, latency_ms)
        }
    }
}
