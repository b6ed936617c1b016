use axum::extract::{Path, State};
use axum::Json;
use hunter_core::{JobId, JobState, JobStatus};
use hunter_engine::{Archiver, OrchestratorError};
use serde::Serialize;

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub url: String,
}

fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound("job not found".to_string()))
}

pub async fn status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobState>, ApiError> {
    let id = parse_job_id(&job_id)?;
    Ok(Json(state.orchestrator.get_status(id)?))
}

pub async fn download(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let id = parse_job_id(&job_id)?;

    // Jobs unknown to this process (e.g. from before a restart) are archived if their files exist.
    match state.orchestrator.get_status(id) {
        Ok(job) if job.status == JobStatus::Running => {
            return Err(ApiError::Conflict("job is still running".to_string()));
        }
        Ok(_) | Err(OrchestratorError::NotFound(_)) => {}
        Err(err) => return Err(err.into()),
    }

    state.archiver.get_or_build_archive(id).await?;
    Ok(Json(DownloadResponse {
        url: format!("/static/{}", Archiver::archive_name(id)),
    }))
}
