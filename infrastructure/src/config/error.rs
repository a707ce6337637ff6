//! Configuration errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("Provider '{provider}' has no API key (set {env} or providers.api_key)")]
    MissingCredential { provider: String, env: String },

    #[error("Provider '{provider}' could not be initialised: {reason}")]
    ProviderSetup { provider: String, reason: String },
}
