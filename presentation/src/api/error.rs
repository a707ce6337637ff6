//! API error type and its JSON rendering

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use consensus_application::{LedgerError, RegistryError};
use consensus_domain::{DomainError, FailureReason, JobStatus};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest {
        message: String,
        field: Option<String>,
    },

    #[error("Missing or invalid {0} header")]
    Unauthorized(&'static str),

    #[error("Unknown subscription tier: {0}")]
    UnknownTier(String),

    #[error("Insufficient tokens")]
    InsufficientTokens {
        required: u64,
        available: u64,
        overage: u64,
    },

    #[error("Job not found")]
    NotFound,

    #[error("Job is not completed")]
    NotCompleted(JobStatus),

    #[error("Job already finished")]
    AlreadyFinished,

    #[error("Generation failed")]
    GenerationFailed(FailureReason),

    #[error("Usage ledger is busy, retry shortly")]
    Busy,

    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::UnknownTier(_) => StatusCode::FORBIDDEN,
            ApiError::InsufficientTokens { .. } => StatusCode::PAYMENT_REQUIRED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::NotCompleted(_) | ApiError::AlreadyFinished => StatusCode::CONFLICT,
            ApiError::GenerationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Value {
        let message = self.to_string();
        match self {
            ApiError::BadRequest { field, .. } => json!({ "error": message, "field": field }),
            ApiError::InsufficientTokens {
                required,
                available,
                overage,
            } => json!({
                "error": message,
                "required": required,
                "available": available,
                "overage": overage,
            }),
            ApiError::NotCompleted(status) => json!({ "error": message, "status": status }),
            ApiError::GenerationFailed(reason) => json!({
                "error": message,
                "code": reason.code.as_str(),
                "phase": reason.phase.map(|p| p.as_str().to_string()),
            }),
            _ => json!({ "error": message }),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Validation { field, reason } => ApiError::BadRequest {
                message: format!("{field}: {reason}"),
                field: Some(field.to_string()),
            },
            other => ApiError::BadRequest {
                message: other.to_string(),
                field: None,
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest {
            message: rejection.body_text(),
            field: None,
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Validation(e) => e.into(),
            RegistryError::AdmissionDenied {
                required,
                available,
                overage,
            } => ApiError::InsufficientTokens {
                required,
                available,
                overage,
            },
            RegistryError::NotFound(_) => ApiError::NotFound,
            RegistryError::NotCompleted(status) => ApiError::NotCompleted(status),
            RegistryError::AlreadyFinished => ApiError::AlreadyFinished,
            RegistryError::GenerationFailed(reason) => ApiError::GenerationFailed(reason),
            RegistryError::Ledger(LedgerError::UnknownTier(tier)) => ApiError::UnknownTier(tier),
            RegistryError::Ledger(LedgerError::Contended(_)) => ApiError::Busy,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            error!(detail = %detail, "Request failed");
        }
        (self.status(), Json(self.body())).into_response()
    }
}
