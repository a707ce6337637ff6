//! HTTP API
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /consensus/generate` | validate, admit and start a job |
//! | `GET /consensus/status/{jobId}` | status, phase and progress |
//! | `GET /consensus/result/{jobId}` | artifact of a completed job |
//! | `POST /consensus/cancel/{jobId}` | fail a running job |
//! | `GET, POST /consensus/estimate` | token estimate and admission preview |
//! | `GET /consensus/usage` | current billing period usage |
//! | `GET /health` | liveness |

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod state;

pub use auth::AccountContext;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// CORS policy; an empty origin list allows any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return cors.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(allowed)
}

/// Create the API router
pub fn create_router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/consensus/generate", post(handlers::generate))
        .route("/consensus/status/{job_id}", get(handlers::status))
        .route("/consensus/result/{job_id}", get(handlers::result))
        .route("/consensus/cancel/{job_id}", post(handlers::cancel))
        .route(
            "/consensus/estimate",
            get(handlers::estimate_get).post(handlers::estimate_post),
        )
        .route("/consensus/usage", get(handlers::usage))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
