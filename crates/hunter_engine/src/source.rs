use std::time::Duration;

use hunter_logging::hunter_debug;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::fetch::build_http_client;
use crate::SourceError;

pub const PEXELS_ENDPOINT: &str = "https://api.pexels.com/v1/search";
pub const PIXABAY_ENDPOINT: &str = "https://pixabay.com/api/";

/// A paginated image search API. An empty page means there is nothing more to fetch.
#[async_trait::async_trait]
pub trait ImageSource: Send + Sync {
    fn name(&self) -> &str;

    /// Largest `page_size` the API honours.
    fn max_page_size(&self) -> u32;

    /// Candidate image URLs for a 1-based `page`.
    async fn search(&self, query: &str, page: u32, page_size: u32)
        -> Result<Vec<String>, SourceError>;
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

fn build_client(settings: &SourceSettings) -> Result<reqwest::Client, SourceError> {
    build_http_client(settings.connect_timeout, settings.request_timeout, 5)
        .map_err(|err| SourceError::Network(err.to_string()))
}

fn parse_endpoint(endpoint: &str) -> Result<Url, SourceError> {
    Url::parse(endpoint).map_err(|err| SourceError::InvalidUrl(format!("{endpoint}: {err}")))
}

#[derive(Debug, Deserialize)]
struct PexelsPage {
    #[serde(default)]
    photos: Vec<PexelsPhoto>,
}

#[derive(Debug, Deserialize)]
struct PexelsPhoto {
    src: PexelsPhotoSources,
}

#[derive(Debug, Deserialize)]
struct PexelsPhotoSources {
    original: String,
}

/// Pexels search: key in the `Authorization` header, up to 80 results per page.
#[derive(Debug, Clone)]
pub struct PexelsSource {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl PexelsSource {
    pub const MAX_PAGE_SIZE: u32 = 80;

    pub fn new(api_key: impl Into<String>, settings: &SourceSettings) -> Result<Self, SourceError> {
        Self::with_endpoint(PEXELS_ENDPOINT, api_key, settings)
    }

    pub fn with_endpoint(
        endpoint: &str,
        api_key: impl Into<String>,
        settings: &SourceSettings,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(settings)?,
            endpoint: parse_endpoint(endpoint)?,
            api_key: api_key.into(),
        })
    }
}

#[async_trait::async_trait]
impl ImageSource for PexelsSource {
    fn name(&self) -> &str {
        "pexels"
    }

    fn max_page_size(&self) -> u32 {
        Self::MAX_PAGE_SIZE
    }

    async fn search(
        &self,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<String>, SourceError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("per_page", &page_size.min(Self::MAX_PAGE_SIZE).to_string())
            .append_pair("page", &page.to_string());

        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, &self.api_key)
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(SourceError::from_reqwest)?;
        let parsed: PexelsPage =
            serde_json::from_slice(&body).map_err(|err| SourceError::Decode(err.to_string()))?;
        hunter_debug!("pexels page {} returned {} photos", page, parsed.photos.len());

        Ok(parsed
            .photos
            .into_iter()
            .map(|photo| photo.src.original)
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct PixabayPage {
    #[serde(default)]
    hits: Vec<PixabayHit>,
}

#[derive(Debug, Deserialize)]
struct PixabayHit {
    #[serde(rename = "largeImageURL")]
    large_image_url: String,
}

/// Pixabay search: key as a query parameter, 3 to 200 results per page, photos only.
#[derive(Debug, Clone)]
pub struct PixabaySource {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl PixabaySource {
    pub const MAX_PAGE_SIZE: u32 = 200;
    pub const MIN_PAGE_SIZE: u32 = 3;

    pub fn new(api_key: impl Into<String>, settings: &SourceSettings) -> Result<Self, SourceError> {
        Self::with_endpoint(PIXABAY_ENDPOINT, api_key, settings)
    }

    pub fn with_endpoint(
        endpoint: &str,
        api_key: impl Into<String>,
        settings: &SourceSettings,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(settings)?,
            endpoint: parse_endpoint(endpoint)?,
            api_key: api_key.into(),
        })
    }
}

#[async_trait::async_trait]
impl ImageSource for PixabaySource {
    fn name(&self) -> &str {
        "pixabay"
    }

    fn max_page_size(&self) -> u32 {
        Self::MAX_PAGE_SIZE
    }

    async fn search(
        &self,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<String>, SourceError> {
        let per_page = page_size.clamp(Self::MIN_PAGE_SIZE, Self::MAX_PAGE_SIZE);
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("q", query)
            .append_pair("image_type", "photo")
            .append_pair("safesearch", "true")
            .append_pair("per_page", &per_page.to_string())
            .append_pair("page", &page.to_string());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST && page > 1 {
            // Pixabay answers a page past its last accessible hit with 400 "[ERROR 400] page is
            // out of valid range" instead of an empty `hits` list; that ends the crawl as done.
            let body = response.text().await.unwrap_or_default();
            if body.contains("out of valid range") {
                hunter_debug!("pixabay page {} is past the last result", page);
                return Ok(Vec::new());
            }
            return Err(SourceError::HttpStatus(status.as_u16()));
        }
        if !status.is_success() {
            return Err(SourceError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(SourceError::from_reqwest)?;
        let parsed: PixabayPage =
            serde_json::from_slice(&body).map_err(|err| SourceError::Decode(err.to_string()))?;
        hunter_debug!("pixabay page {} returned {} hits", page, parsed.hits.len());

        Ok(parsed
            .hits
            .into_iter()
            .map(|hit| hit.large_image_url)
            .collect())
    }
}
