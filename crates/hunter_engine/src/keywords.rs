use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use hunter_logging::{hunter_debug, hunter_warn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::fetch::build_http_client;

/// Query used whenever no usable term could be extracted.
pub const FALLBACK_KEYWORD: &str = "popular";
pub const MAX_TERMS: usize = 8;
pub const MAX_QUERY_CHARS: usize = 100;

/// Name fragments that cameras and phones put in file names; they say nothing about the content.
const GENERIC_NAME_PARTS: &[&str] = &[
    "img", "image", "images", "photo", "pic", "picture", "dsc", "dscn", "dcim", "pxl", "screenshot",
    "screen", "shot", "scan", "upload", "file", "copy", "edited", "final", "untitled", "whatsapp",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("empty image upload")]
    EmptyImage,
    #[error("keyword service returned status {0}")]
    HttpStatus(u16),
    #[error("keyword service request failed: {0}")]
    Network(String),
    #[error("unexpected keyword service response: {0}")]
    Decode(String),
}

/// An image received from a client, kept in memory for the duration of the extraction.
#[derive(Debug, Clone, Default)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Turns an uploaded image into a search query.
///
/// Implementations never fail outward: the result is always a non-empty query,
/// [`FALLBACK_KEYWORD`] when nothing better is available.
#[async_trait::async_trait]
pub trait KeywordExtractor: Send + Sync {
    async fn extract(&self, image: &UploadedImage) -> String;
}

/// One source of candidate terms for an image.
#[async_trait::async_trait]
pub trait KeywordSignal: Send + Sync {
    fn name(&self) -> &str;

    async fn terms(&self, image: &UploadedImage) -> Result<Vec<String>, ExtractionError>;
}

/// Joins unique terms into an `OR` query, quoting multi-word terms.
///
/// At most [`MAX_TERMS`] terms are used and the result never exceeds
/// [`MAX_QUERY_CHARS`]; terms that would overflow are skipped.
pub fn build_query<I, S>(terms: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: Vec<String> = Vec::new();
    for term in terms {
        let cleaned = term
            .as_ref()
            .replace('"', "")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if cleaned.is_empty() || seen.contains(&cleaned) {
            continue;
        }
        seen.push(cleaned);
    }

    let mut query = String::new();
    let mut used = 0;
    for term in seen {
        if used == MAX_TERMS {
            break;
        }
        let rendered = if term.contains(' ') {
            format!("\"{term}\"")
        } else {
            term
        };
        let separator = if query.is_empty() { "" } else { " OR " };
        if query.len() + separator.len() + rendered.len() > MAX_QUERY_CHARS {
            continue;
        }
        query.push_str(separator);
        query.push_str(&rendered);
        used += 1;
    }

    if query.is_empty() {
        FALLBACK_KEYWORD.to_string()
    } else {
        query
    }
}

/// Collects terms from every signal; a failing signal only loses its own terms.
pub struct MultiSignalExtractor {
    signals: Vec<Arc<dyn KeywordSignal>>,
}

impl MultiSignalExtractor {
    pub fn new(signals: Vec<Arc<dyn KeywordSignal>>) -> Self {
        Self { signals }
    }
}

#[async_trait::async_trait]
impl KeywordExtractor for MultiSignalExtractor {
    async fn extract(&self, image: &UploadedImage) -> String {
        if image.bytes.is_empty() {
            hunter_warn!("keyword extraction: {}", ExtractionError::EmptyImage);
            return FALLBACK_KEYWORD.to_string();
        }

        let mut terms = Vec::new();
        for signal in &self.signals {
            match signal.terms(image).await {
                Ok(found) => {
                    hunter_debug!("signal {} produced {:?}", signal.name(), found);
                    terms.extend(found);
                }
                Err(err) => hunter_warn!("signal {} failed: {}", signal.name(), err),
            }
        }
        build_query(terms)
    }
}

/// Reads descriptive words out of the uploaded file name, e.g. `red_sports-car.jpg`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileNameSignal;

impl FileNameSignal {
    fn phrase(file_name: &str) -> Option<String> {
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(file_name);

        let words: Vec<String> = stem
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| word.len() >= 3)
            .filter(|word| !word.chars().any(|c| c.is_ascii_digit()))
            .map(|word| word.to_lowercase())
            .filter(|word| !GENERIC_NAME_PARTS.contains(&word.as_str()))
            .collect();

        if words.is_empty() {
            None
        } else {
            Some(words.join(" "))
        }
    }
}

#[async_trait::async_trait]
impl KeywordSignal for FileNameSignal {
    fn name(&self) -> &str {
        "file-name"
    }

    async fn terms(&self, image: &UploadedImage) -> Result<Vec<String>, ExtractionError> {
        Ok(image
            .file_name
            .as_deref()
            .and_then(Self::phrase)
            .into_iter()
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct Caption {
    generated_text: String,
}

/// Posts the raw image to a captioning service answering `[{"generated_text": "..."}]`.
#[derive(Debug, Clone)]
pub struct CaptionSignal {
    client: reqwest::Client,
    endpoint: Url,
    token: Option<String>,
}

impl CaptionSignal {
    pub fn new(
        endpoint: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ExtractionError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|err| ExtractionError::Network(format!("{endpoint}: {err}")))?;
        let client = build_http_client(timeout, timeout, 5)
            .map_err(|err| ExtractionError::Network(err.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            token,
        })
    }
}

#[async_trait::async_trait]
impl KeywordSignal for CaptionSignal {
    fn name(&self) -> &str {
        "caption"
    }

    async fn terms(&self, image: &UploadedImage) -> Result<Vec<String>, ExtractionError> {
        let content_type = image
            .content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, content_type)
            .body(image.bytes.clone());
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|err| ExtractionError::Network(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionError::HttpStatus(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| ExtractionError::Network(err.to_string()))?;
        let captions: Vec<Caption> =
            serde_json::from_slice(&body).map_err(|err| ExtractionError::Decode(err.to_string()))?;

        Ok(captions
            .into_iter()
            .map(|caption| caption.generated_text.trim().to_string())
            .filter(|caption| !caption.is_empty())
            .take(1)
            .collect())
    }
}
