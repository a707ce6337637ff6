//! Caller identity supplied by the upstream auth middleware.
//!
//! The gateway in front of this service authenticates the request and
//! forwards the account id and subscription tier as headers. Requests that
//! arrive without them are rejected before any handler runs.

use super::error::ApiError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use consensus_application::Caller;
use consensus_domain::AccountId;

pub const ACCOUNT_HEADER: &str = "x-account-id";
pub const TIER_HEADER: &str = "x-subscription-tier";

/// Authenticated caller extracted from request headers
#[derive(Debug, Clone)]
pub struct AccountContext(pub Caller);

fn header<'a>(parts: &'a Parts, name: &'static str) -> Result<&'a str, ApiError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::Unauthorized(name))
}

impl<S> FromRequestParts<S> for AccountContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let account_id = AccountId::new(header(parts, ACCOUNT_HEADER)?)
            .map_err(|_| ApiError::Unauthorized(ACCOUNT_HEADER))?;
        let tier = header(parts, TIER_HEADER)?;
        Ok(Self(Caller::new(account_id, tier)))
    }
}
