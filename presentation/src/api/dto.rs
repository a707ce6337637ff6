//! Request and response bodies (camelCase JSON)

use consensus_application::{EstimateReport, GenerateRequest};
use consensus_domain::{Depth, DomainError, GenerationOptions, Job, JobId, JobStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptionsBody {
    pub depth: Option<String>,
    pub include_metadata: bool,
}

impl OptionsBody {
    fn parse(self) -> Result<GenerationOptions, DomainError> {
        let depth = match self.depth.as_deref() {
            Some(depth) => depth.parse::<Depth>()?,
            None => Depth::default(),
        };
        Ok(GenerationOptions {
            depth,
            include_metadata: self.include_metadata,
        })
    }
}

/// Body of `POST /consensus/generate` and `POST /consensus/estimate`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateBody {
    pub topic: String,
    pub sources: Vec<String>,
    pub options: OptionsBody,
}

impl GenerateBody {
    pub fn into_request(self) -> Result<GenerateRequest, DomainError> {
        Ok(GenerateRequest {
            topic: self.topic,
            sources: self.sources,
            options: self.options.parse()?,
        })
    }

    /// Build from `GET /consensus/estimate?topic=..&source=..&source=..&depth=..`
    pub fn from_query(pairs: Vec<(String, String)>) -> Self {
        let mut body = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "topic" => body.topic = value,
                "source" | "sources" => body.sources.push(value),
                "depth" => body.options.depth = Some(value),
                _ => {}
            }
        }
        body
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: String,
}

impl From<JobId> for SubmitResponse {
    fn from(id: JobId) -> Self {
        Self {
            job_id: id.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub phase: Option<String>,
    pub progress: u8,
    pub estimated_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_tokens: Option<u64>,
    /// Diagnostic code of a failed job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Job> for StatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id().to_string(),
            status: job.status(),
            phase: job.current_phase().map(|p| p.as_str().to_string()),
            progress: job.progress(),
            estimated_tokens: job.estimated_tokens(),
            actual_tokens: job.actual_tokens(),
            error_code: job.failure().map(|f| f.code.as_str()),
            created_at: job.created_at(),
            updated_at: job.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateResponse {
    pub estimated_tokens: u64,
    pub available: u64,
    pub sufficient: bool,
    /// Whether a submission would be admitted right now
    pub admitted: bool,
    pub overage: u64,
}

impl From<EstimateReport> for EstimateResponse {
    fn from(report: EstimateReport) -> Self {
        Self {
            estimated_tokens: report.estimated_tokens,
            available: report.check.available,
            sufficient: report.check.sufficient,
            admitted: report.check.admitted,
            overage: report.check.overage,
        }
    }
}
