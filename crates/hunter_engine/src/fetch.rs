use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use hunter_logging::hunter_trace;
use reqwest::header::CONTENT_TYPE;
use tokio::io::AsyncWriteExt;

use crate::{FailureKind, FetchError, FetchOutput};

/// Full-size stock photos (Pexels `src.original`) regularly exceed 20 MiB.
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    /// Accepted `Content-Type` prefixes. Empty accepts anything; a missing header is accepted.
    pub allowed_content_types: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
            allowed_content_types: vec![
                "image/".to_string(),
                "application/octet-stream".to_string(),
                "binary/octet-stream".to_string(),
            ],
        }
    }
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Streams `url` into `destination`. A partially written file is removed on failure.
    async fn fetch(&self, url: &str, destination: &Path) -> Result<FetchOutput, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = build_http_client(
            settings.connect_timeout,
            settings.request_timeout,
            settings.redirect_limit,
        )
        .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        if self.settings.allowed_content_types.is_empty() {
            return true;
        }
        let ct = content_type
            .split(';')
            .next()
            .unwrap_or(content_type)
            .trim()
            .to_ascii_lowercase();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| ct.starts_with(&allowed.to_ascii_lowercase()))
    }

    fn check_length(&self, actual: u64) -> Result<(), FetchError> {
        if actual > self.settings.max_bytes {
            return Err(FetchError::new(
                FailureKind::TooLarge {
                    max_bytes: self.settings.max_bytes,
                    actual: Some(actual),
                },
                "response too large",
            ));
        }
        Ok(())
    }

    async fn stream_to_file(
        &self,
        response: reqwest::Response,
        destination: &Path,
    ) -> Result<u64, FetchError> {
        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(|err| io_error(destination, err))?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            written += chunk.len() as u64;
            self.check_length(written)?;
            file.write_all(&chunk)
                .await
                .map_err(|err| io_error(destination, err))?;
        }
        file.flush().await.map_err(|err| io_error(destination, err))?;
        Ok(written)
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<FetchOutput, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            self.check_length(content_len)?;
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if let Some(ct) = content_type.as_deref() {
            if !self.is_content_type_allowed(ct) {
                return Err(FetchError::new(
                    FailureKind::UnsupportedContentType {
                        content_type: ct.to_string(),
                    },
                    "unsupported content type",
                ));
            }
        }

        let bytes_written = match self.stream_to_file(response, destination).await {
            Ok(written) => written,
            Err(err) => {
                let _ = tokio::fs::remove_file(destination).await;
                return Err(err);
            }
        };
        hunter_trace!("fetched {} -> {:?} ({} bytes)", url, destination, bytes_written);

        Ok(FetchOutput {
            url: url.to_string(),
            path: destination.to_path_buf(),
            content_type,
            bytes_written,
        })
    }
}

pub(crate) fn build_http_client(
    connect_timeout: Duration,
    request_timeout: Duration,
    redirect_limit: usize,
) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .redirect(reqwest::redirect::Policy::limited(redirect_limit))
        .build()
}

fn io_error(path: &Path, err: std::io::Error) -> FetchError {
    FetchError::new(FailureKind::Io, format!("{}: {err}", path.display()))
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
