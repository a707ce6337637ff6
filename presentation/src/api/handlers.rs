//! Route handlers

use super::auth::AccountContext;
use super::dto::{EstimateResponse, GenerateBody, StatusResponse, SubmitResponse};
use super::error::{ApiError, ApiResult};
use super::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use consensus_domain::{ConsensusArtifact, JobId, UsageSummary};

fn job_id(raw: &str) -> ApiResult<JobId> {
    // Malformed ids cannot belong to the caller
    raw.parse().map_err(|_| ApiError::NotFound)
}

pub async fn generate(
    State(state): State<AppState>,
    AccountContext(caller): AccountContext,
    body: Result<Json<GenerateBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let Json(body) = body?;
    let request = body.into_request()?;
    let job_id = state.registry.submit(&caller, request).await?;
    Ok((StatusCode::ACCEPTED, Json(job_id.into())))
}

pub async fn status(
    State(state): State<AppState>,
    AccountContext(caller): AccountContext,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let job = state.registry.get_job(&caller, job_id(&raw_id)?).await?;
    Ok(Json(StatusResponse::from(&job)))
}

pub async fn result(
    State(state): State<AppState>,
    AccountContext(caller): AccountContext,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<ConsensusArtifact>> {
    let artifact = state.registry.get_result(&caller, job_id(&raw_id)?).await?;
    Ok(Json(artifact))
}

pub async fn cancel(
    State(state): State<AppState>,
    AccountContext(caller): AccountContext,
    Path(raw_id): Path<String>,
) -> ApiResult<(StatusCode, Json<StatusResponse>)> {
    let job = state.registry.cancel(&caller, job_id(&raw_id)?).await?;
    Ok((StatusCode::ACCEPTED, Json(StatusResponse::from(&job))))
}

pub async fn estimate_get(
    State(state): State<AppState>,
    AccountContext(caller): AccountContext,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<EstimateResponse>> {
    let request = GenerateBody::from_query(pairs).into_request()?;
    let report = state.registry.estimate(&caller, request).await?;
    Ok(Json(report.into()))
}

pub async fn estimate_post(
    State(state): State<AppState>,
    AccountContext(caller): AccountContext,
    body: Result<Json<GenerateBody>, JsonRejection>,
) -> ApiResult<Json<EstimateResponse>> {
    let Json(body) = body?;
    let report = state.registry.estimate(&caller, body.into_request()?).await?;
    Ok(Json(report.into()))
}

pub async fn usage(
    State(state): State<AppState>,
    AccountContext(caller): AccountContext,
) -> ApiResult<Json<UsageSummary>> {
    Ok(Json(state.registry.usage(&caller).await?))
}

pub async fn health() -> &'static str {
    "ok"
}
