//! Image hunter engine: image sources, downloads, job orchestration and archives.
mod archive;
mod context;
mod crawler;
mod fetch;
mod keywords;
mod orchestrator;
mod persist;
mod registry;
mod source;
mod types;

pub use archive::{ArchiveError, Archiver};
pub use context::{AbortReason, JobContext};
pub use crawler::{CrawlReport, CrawlRequest, CrawlSettings, PageCrawler};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher, DEFAULT_MAX_IMAGE_BYTES};
pub use keywords::{
    build_query, CaptionSignal, ExtractionError, FileNameSignal, KeywordExtractor, KeywordSignal,
    MultiSignalExtractor, UploadedImage, FALLBACK_KEYWORD, MAX_QUERY_CHARS, MAX_TERMS,
};
pub use orchestrator::{JobOrchestrator, OrchestratorError, OrchestratorSettings};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use registry::{InMemoryJobRegistry, JobRegistry, RegistryError};
pub use source::{
    ImageSource, PexelsSource, PixabaySource, SourceSettings, PEXELS_ENDPOINT, PIXABAY_ENDPOINT,
};
pub use types::{FailureKind, FetchError, FetchOutput, SourceError};
