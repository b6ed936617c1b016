use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use hunter_core::{JobId, DEFAULT_ITEMS};
use hunter_engine::UploadedImage;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CrawlRequest {
    pub keyword: String,
    #[serde(default = "default_max_num")]
    pub max_num: i64,
}

fn default_max_num() -> i64 {
    DEFAULT_ITEMS as i64
}

#[derive(Debug, Serialize)]
pub struct CrawlResponse {
    pub job_id: JobId,
}

#[derive(Debug, Serialize)]
pub struct UploadCrawlResponse {
    pub job_id: JobId,
    pub keyword: String,
}

/// Negative counts mean "nothing"; the orchestrator clamps the upper end.
fn requested_items(max_num: i64) -> u64 {
    u64::try_from(max_num).unwrap_or(0)
}

pub async fn crawl(
    State(state): State<AppState>,
    body: Result<Json<CrawlRequest>, JsonRejection>,
) -> Result<Json<CrawlResponse>, ApiError> {
    let Json(body) = body?;
    let job_id = state
        .orchestrator
        .start_job(&body.keyword, requested_items(body.max_num))?;
    Ok(Json(CrawlResponse { job_id }))
}

pub async fn crawl_by_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadCrawlResponse>, ApiError> {
    let mut image: Option<UploadedImage> = None;
    let mut max_num = default_max_num();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") | Some("image") => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                image = Some(UploadedImage {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            Some("max_num") => {
                let text = field.text().await?;
                max_num = text.trim().parse().map_err(|_| {
                    ApiError::BadRequest(format!("max_num must be an integer, got {text:?}"))
                })?;
            }
            _ => {}
        }
    }

    let image = image.ok_or_else(|| ApiError::BadRequest("image file is required".to_string()))?;
    let (job_id, keyword) = state
        .orchestrator
        .start_job_from_image(&image, requested_items(max_num))
        .await?;
    Ok(Json(UploadCrawlResponse { job_id, keyword }))
}
