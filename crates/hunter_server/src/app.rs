//! Router and shared state.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::{HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use hunter_engine::{
    Archiver, CaptionSignal, CrawlSettings, FetchSettings, FileNameSignal, ImageSource,
    InMemoryJobRegistry, JobOrchestrator, KeywordSignal, MultiSignalExtractor,
    OrchestratorSettings, PageCrawler, PexelsSource, PixabaySource, ReqwestFetcher,
    SourceSettings,
};
use hunter_logging::{hunter_info, hunter_warn};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::config::{Config, Provider};
use crate::routes;

/// Largest accepted image upload.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<JobOrchestrator>,
    pub archiver: Arc<Archiver>,
}

impl AppState {
    pub fn new(orchestrator: Arc<JobOrchestrator>, archiver: Arc<Archiver>) -> Self {
        Self {
            orchestrator,
            archiver,
        }
    }

    /// Wires the image source, downloader, keyword signals and job registry described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let source_settings = SourceSettings {
            request_timeout: config.request_timeout(),
            ..SourceSettings::default()
        };
        let api_key = config.api_key()?;
        let source: Arc<dyn ImageSource> = match config.provider {
            Provider::Pexels => Arc::new(
                PexelsSource::new(api_key, &source_settings).context("building Pexels client")?,
            ),
            Provider::Pixabay => Arc::new(
                PixabaySource::new(api_key, &source_settings).context("building Pixabay client")?,
            ),
        };

        let fetcher = ReqwestFetcher::new(FetchSettings {
            request_timeout: config.request_timeout(),
            max_bytes: config.max_image_bytes,
            ..FetchSettings::default()
        })
        .context("building download client")?;
        let crawler = PageCrawler::new(
            source,
            Arc::new(fetcher),
            CrawlSettings {
                max_concurrent_fetches: config.max_concurrent_fetches,
            },
        );

        let mut signals: Vec<Arc<dyn KeywordSignal>> = Vec::new();
        if let Some(endpoint) = config.caption_endpoint.as_deref() {
            let caption =
                CaptionSignal::new(endpoint, config.caption_token.clone(), config.request_timeout())
                    .context("building caption client")?;
            signals.push(Arc::new(caption));
        }
        signals.push(Arc::new(FileNameSignal));

        let orchestrator = JobOrchestrator::new(
            OrchestratorSettings {
                output_root: config.output_dir.clone(),
                job_deadline: config.job_deadline(),
            },
            Arc::new(InMemoryJobRegistry::new()),
            Arc::new(crawler),
            Arc::new(MultiSignalExtractor::new(signals)),
        );

        Ok(Self::new(
            Arc::new(orchestrator),
            Arc::new(Archiver::new(config.output_dir.clone())),
        ))
    }
}

pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let static_files = ServeDir::new(state.archiver.output_root());

    Router::new()
        .route("/crawl", post(routes::crawl))
        .route(
            "/crawl-by-upload",
            post(routes::crawl_by_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/status/:job_id", get(routes::status))
        .route("/download/:job_id", get(routes::download))
        .route("/health", get(routes::health))
        .nest_service("/static", static_files)
        .layer(middleware::from_fn(log_requests))
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if origins.iter().any(|origin| origin.trim() == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                hunter_warn!("ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    hunter_info!(
        "{} {} -> {} ({} ms)",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}
