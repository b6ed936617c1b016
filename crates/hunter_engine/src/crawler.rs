use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::future::join_all;
use hunter_core::{update, CandidateItem, CrawlState, CrawlSummary, Effect, JobId, JobStatus, Msg};
use hunter_logging::{hunter_debug, hunter_info, hunter_warn};
use tokio::sync::Semaphore;

use crate::{FailureKind, FetchError, FetchOutput, Fetcher, ImageSource, JobContext, SourceError};

#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Ceiling on in-flight downloads, shared by every job using the same crawler.
    pub max_concurrent_fetches: usize,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlRequest {
    pub job_id: JobId,
    pub query: String,
    pub target: usize,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub status: JobStatus,
    pub message: String,
    pub summary: CrawlSummary,
}

/// Drives an [`ImageSource`] page by page and fans each page out to the [`Fetcher`].
///
/// The decisions live in `hunter_core::update`; this type only executes the
/// effects it returns and feeds the results back in as messages.
pub struct PageCrawler {
    source: Arc<dyn ImageSource>,
    fetcher: Arc<dyn Fetcher>,
    permits: Arc<Semaphore>,
}

impl PageCrawler {
    pub fn new(
        source: Arc<dyn ImageSource>,
        fetcher: Arc<dyn Fetcher>,
        settings: CrawlSettings,
    ) -> Self {
        Self {
            source,
            fetcher,
            permits: Arc::new(Semaphore::new(settings.max_concurrent_fetches.max(1))),
        }
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub async fn run(&self, request: &CrawlRequest, ctx: &JobContext) -> CrawlReport {
        let mut state = CrawlState::new(
            request.target,
            self.source.max_page_size(),
            request.output_dir.clone(),
        );
        let mut inbox = VecDeque::from([Msg::Start]);

        while let Some(msg) = inbox.pop_front() {
            let (next, effects) = update(state, msg);
            state = next;
            for effect in effects {
                match effect {
                    Effect::RequestPage { page, page_size } => {
                        inbox.push_back(self.request_page(request, page, page_size, ctx).await);
                    }
                    Effect::FetchBatch { page, items } => {
                        inbox.push_back(self.fetch_batch(request.job_id, page, items, ctx).await);
                    }
                    Effect::Finish { status, message } => {
                        return CrawlReport {
                            status,
                            message,
                            summary: state.summary(),
                        };
                    }
                }
            }
        }

        CrawlReport {
            status: JobStatus::Error,
            message: "crawl stopped without a result".to_string(),
            summary: state.summary(),
        }
    }

    async fn request_page(
        &self,
        request: &CrawlRequest,
        page: u32,
        page_size: u32,
        ctx: &JobContext,
    ) -> Msg {
        hunter_debug!(
            "job {} requesting page {} (size {}) from {}",
            request.job_id,
            page,
            page_size,
            self.source.name()
        );
        match ctx
            .guard(self.source.search(&request.query, page, page_size))
            .await
        {
            Err(reason) => Msg::Aborted {
                reason: reason.to_string(),
            },
            Ok(Ok(urls)) => Msg::PageLoaded { page, urls },
            Ok(Err(SourceError::HttpStatus(status))) => Msg::PageRejected { page, status },
            Ok(Err(SourceError::Network(reason))) => Msg::PageFailed { page, reason },
            Ok(Err(err)) => Msg::PageFailed {
                page,
                reason: err.to_string(),
            },
        }
    }

    async fn fetch_batch(
        &self,
        job_id: JobId,
        page: u32,
        items: Vec<CandidateItem>,
        ctx: &JobContext,
    ) -> Msg {
        let fetches = items.iter().map(|item| self.fetch_one(item));
        let results = match ctx.guard(join_all(fetches)).await {
            Ok(results) => results,
            Err(reason) => {
                return Msg::Aborted {
                    reason: reason.to_string(),
                }
            }
        };

        let mut succeeded = 0;
        let mut failed = 0;
        for (item, result) in items.iter().zip(results) {
            match result {
                Ok(_) => succeeded += 1,
                Err(err) => {
                    failed += 1;
                    hunter_warn!(
                        "job {} item {} ({}) failed: {}",
                        job_id,
                        item.index,
                        item.url,
                        err
                    );
                }
            }
        }
        hunter_info!(
            "job {} page {}: {} succeeded, {} failed",
            job_id,
            page,
            succeeded,
            failed
        );

        Msg::BatchFinished { succeeded, failed }
    }

    async fn fetch_one(&self, item: &CandidateItem) -> Result<FetchOutput, FetchError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FetchError::new(FailureKind::Cancelled, "fetch pool closed"))?;
        self.fetcher.fetch(&item.url, &item.path).await
    }
}
