//! Language-model provider adapters
//!
//! Each adapter speaks one HTTP API and maps its failures onto
//! [`ProviderError`](consensus_application::ProviderError). Adapters are
//! built once at startup from resolved [`ProviderSettings`]; they hold the
//! credential and never consult the environment.

mod anthropic;
mod http;
mod openai;

pub use anthropic::AnthropicAdapter;
pub use openai::OpenAiAdapter;

use crate::config::{ConfigError, FileProviderConfig, ProviderKind};
use consensus_application::ProviderAdapter;
use consensus_domain::ProviderId;
use std::sync::Arc;
use tracing::info;

/// Everything an adapter needs, with the credential already resolved
#[derive(Clone)]
pub struct ProviderSettings {
    pub id: ProviderId,
    pub kind: ProviderKind,
    pub model: String,
    /// Base URL without trailing slash
    pub base_url: String,
    pub api_key: String,
    pub max_tokens: u32,
    pub api_version: String,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Build one adapter for the configured wire protocol.
pub fn build_adapter(settings: ProviderSettings) -> Result<Arc<dyn ProviderAdapter>, ConfigError> {
    let client = http::build_client().map_err(|e| ConfigError::ProviderSetup {
        provider: settings.id.to_string(),
        reason: e.to_string(),
    })?;
    Ok(match settings.kind {
        ProviderKind::Anthropic => Arc::new(AnthropicAdapter::new(client, settings)),
        ProviderKind::OpenAi => Arc::new(OpenAiAdapter::new(client, settings)),
    })
}

/// Build adapters for every enabled entry, in file order.
pub fn build_adapters<'a, I, F>(
    entries: I,
    lookup_env: F,
) -> Result<Vec<Arc<dyn ProviderAdapter>>, ConfigError>
where
    I: IntoIterator<Item = &'a FileProviderConfig>,
    F: Fn(&str) -> Option<String>,
{
    entries
        .into_iter()
        .filter(|entry| entry.enabled)
        .map(|entry| {
            let settings = entry.resolve(&lookup_env)?;
            info!(
                provider = %settings.id,
                kind = ?settings.kind,
                model = %settings.model,
                "Configured provider"
            );
            build_adapter(settings)
        })
        .collect()
}
