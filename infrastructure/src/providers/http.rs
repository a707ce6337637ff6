//! Shared HTTP plumbing for the provider adapters.

use consensus_application::ProviderError;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Longest error body excerpt carried into a [`ProviderError`]
const MAX_ERROR_EXCERPT: usize = 300;

/// Client shared by all calls of one adapter.
///
/// There is no overall request timeout here; the pipeline bounds every call.
pub(crate) fn build_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("consensus-server/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Map a failed `send()` to a provider error.
pub(crate) fn send_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::TransportError(e.to_string())
    }
}

/// Check the status and decode the JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status, &body));
    }
    let body = response.text().await.map_err(send_error)?;
    serde_json::from_str(&body)
        .map_err(|e| ProviderError::invalid_response(format!("malformed body: {e}")))
}

pub(crate) fn status_error(status: StatusCode, body: &str) -> ProviderError {
    let excerpt: String = body.chars().take(MAX_ERROR_EXCERPT).collect();
    let message = format!("HTTP {}: {}", status.as_u16(), excerpt.trim());
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ProviderError::Timeout,
        s if s.is_server_error() => ProviderError::TransportError(message),
        _ => ProviderError::invalid_response(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            ProviderError::RateLimited(m) if m.contains("429")
        ));
        assert_eq!(
            status_error(StatusCode::GATEWAY_TIMEOUT, ""),
            ProviderError::Timeout
        );
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, ""),
            ProviderError::TransportError(_)
        ));
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "bad key"),
            ProviderError::InvalidResponse { tokens_used: 0, .. }
        ));
    }

    #[test]
    fn test_error_excerpt_is_bounded() {
        let body = "x".repeat(5_000);
        let ProviderError::InvalidResponse { message, .. } = status_error(StatusCode::BAD_REQUEST, &body)
        else {
            panic!("expected InvalidResponse");
        };
        assert!(message.len() < 400);
    }
}
