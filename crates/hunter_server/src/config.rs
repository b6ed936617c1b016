//! Server configuration from command-line flags and environment variables.
//!
//! Every flag has an environment variable, so a `.env` file loaded before
//! parsing is enough to configure a deployment:
//!
//! ```text
//! PEXELS_API_KEY=... HUNTER_PORT=8000 hunter_server
//! hunter_server --provider pixabay --output-dir /srv/images
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use hunter_engine::DEFAULT_MAX_IMAGE_BYTES;
use hunter_logging::{LevelFilter, LogDestination};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    Pexels,
    Pixabay,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "hunter_server")]
#[command(about = "Fetches batches of images from a stock photo API and serves them as zip archives")]
#[command(version)]
pub struct Config {
    #[arg(long, default_value = "0.0.0.0", env = "HUNTER_HOST")]
    pub host: String,

    #[arg(short, long, default_value = "8000", env = "HUNTER_PORT")]
    pub port: u16,

    /// Directory holding one sub-directory per job and the built archives.
    #[arg(long = "output-dir", default_value = "images", env = "HUNTER_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    #[arg(long, value_enum, default_value = "pexels", env = "IMAGE_PROVIDER")]
    pub provider: Provider,

    #[arg(long, env = "PEXELS_API_KEY", hide_env_values = true)]
    pub pexels_api_key: Option<String>,

    #[arg(long, env = "PIXABAY_API_KEY", hide_env_values = true)]
    pub pixabay_api_key: Option<String>,

    /// Downloads in flight across all jobs.
    #[arg(long = "max-concurrent-fetches", default_value = "16", env = "HUNTER_MAX_CONCURRENT_FETCHES")]
    pub max_concurrent_fetches: usize,

    /// Per-request timeout for the image API and for each download, in seconds.
    #[arg(long = "request-timeout", default_value = "30", env = "HUNTER_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: u64,

    /// Largest image accepted per download; bigger files count as failed items.
    #[arg(long = "max-image-bytes", default_value_t = DEFAULT_MAX_IMAGE_BYTES, env = "HUNTER_MAX_IMAGE_BYTES")]
    pub max_image_bytes: u64,

    /// Overall budget of one job, in seconds.
    #[arg(long = "job-deadline", default_value = "600", env = "HUNTER_JOB_DEADLINE_SECS")]
    pub job_deadline_secs: u64,

    /// Image captioning endpoint used to derive keywords from uploads.
    #[arg(long = "caption-endpoint", env = "CAPTION_ENDPOINT")]
    pub caption_endpoint: Option<String>,

    #[arg(long = "caption-token", env = "CAPTION_API_TOKEN", hide_env_values = true)]
    pub caption_token: Option<String>,

    /// Allowed CORS origins, comma separated. `*` allows any origin.
    #[arg(long = "cors-origins", default_value = "*", value_delimiter = ',', env = "HUNTER_CORS_ORIGINS")]
    pub cors_origins: Vec<String>,

    /// `terminal`, `file` or `both`.
    #[arg(long = "log", default_value = "terminal", env = "HUNTER_LOG")]
    pub log_destination: String,

    #[arg(long = "log-level", default_value = "info", env = "HUNTER_LOG_LEVEL")]
    pub log_level: LevelFilter,
}

impl Config {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn job_deadline(&self) -> Duration {
        Duration::from_secs(self.job_deadline_secs)
    }

    pub fn log_destination(&self) -> Result<LogDestination> {
        match LogDestination::parse(&self.log_destination) {
            Some(destination) => Ok(destination),
            None => bail!(
                "unknown log destination {:?} (expected terminal, file or both)",
                self.log_destination
            ),
        }
    }

    /// API key of the selected provider.
    pub fn api_key(&self) -> Result<&str> {
        let (key, var) = match self.provider {
            Provider::Pexels => (self.pexels_api_key.as_deref(), "PEXELS_API_KEY"),
            Provider::Pixabay => (self.pixabay_api_key.as_deref(), "PIXABAY_API_KEY"),
        };
        match key.map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => bail!("{var} is required for the {:?} provider", self.provider),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.api_key()?;
        self.log_destination()?;
        if self.max_concurrent_fetches == 0 {
            bail!("max concurrent fetches must be >= 1");
        }
        if self.request_timeout_secs == 0 {
            bail!("request timeout must be > 0");
        }
        if self.max_image_bytes == 0 {
            bail!("max image bytes must be > 0");
        }
        if self.job_deadline_secs == 0 {
            bail!("job deadline must be > 0");
        }
        Ok(())
    }
}
