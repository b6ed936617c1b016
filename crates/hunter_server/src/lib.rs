//! HTTP surface of the image hunter: job submission, polling and archive download.
pub mod app;
pub mod config;
pub mod error;
mod routes;

pub use app::{build_router, AppState};
pub use config::{Config, Provider};
pub use error::ApiError;
