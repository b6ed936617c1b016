mod crawl;
mod jobs;

use axum::Json;
use serde_json::{json, Value};

pub use crawl::{crawl, crawl_by_upload};
pub use jobs::{download, status};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
