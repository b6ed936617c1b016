use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use hunter_core::{clamp_max_items, JobId, JobState, JobStatus};
use hunter_logging::{hunter_error, hunter_info, hunter_warn};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    ensure_output_dir, CrawlRequest, JobContext, JobRegistry, KeywordExtractor, PageCrawler,
    PersistError, UploadedImage,
};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("search keyword must not be empty")]
    EmptyQuery,
    #[error("job {0} not found")]
    NotFound(JobId),
    #[error("cannot prepare output directory: {0}")]
    OutputDir(#[from] PersistError),
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Parent of every `<job_id>/` download directory.
    pub output_root: PathBuf,
    /// Overall budget of one job, from start to terminal state.
    pub job_deadline: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("images"),
            job_deadline: Duration::from_secs(600),
        }
    }
}

/// Creates jobs, runs their crawls in the background and records the outcome.
pub struct JobOrchestrator {
    settings: OrchestratorSettings,
    registry: Arc<dyn JobRegistry>,
    crawler: Arc<PageCrawler>,
    extractor: Arc<dyn KeywordExtractor>,
    shutdown: CancellationToken,
    tasks: Mutex<HashMap<JobId, JoinHandle<()>>>,
}

impl JobOrchestrator {
    pub fn new(
        settings: OrchestratorSettings,
        registry: Arc<dyn JobRegistry>,
        crawler: Arc<PageCrawler>,
        extractor: Arc<dyn KeywordExtractor>,
    ) -> Self {
        Self {
            settings,
            registry,
            crawler,
            extractor,
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn output_root(&self) -> &PathBuf {
        &self.settings.output_root
    }

    pub fn output_dir(&self, id: JobId) -> PathBuf {
        self.settings.output_root.join(id.to_string())
    }

    /// Registers a `running` job and schedules its crawl. Must be called inside a tokio runtime.
    pub fn start_job(&self, query: &str, requested: u64) -> Result<JobId, OrchestratorError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(OrchestratorError::EmptyQuery);
        }
        let target = clamp_max_items(requested);

        let id = self.registry.create();
        let output_dir = self.output_dir(id);
        if let Err(err) = ensure_output_dir(&output_dir) {
            hunter_error!("job {} cannot use {}: {}", id, output_dir.display(), err);
            self.record(id, JobStatus::Error, &err.to_string());
            return Err(err.into());
        }

        hunter_info!(
            "job {} started: query {:?}, target {} (requested {}), source {}",
            id,
            query,
            target,
            requested,
            self.crawler.source_name()
        );

        let request = CrawlRequest {
            job_id: id,
            query: query.to_string(),
            target,
            output_dir,
        };
        let ctx = JobContext::new(self.shutdown.child_token(), self.settings.job_deadline);
        let crawler = Arc::clone(&self.crawler);
        let registry = Arc::clone(&self.registry);

        let handle = tokio::spawn(async move {
            let outcome = AssertUnwindSafe(crawler.run(&request, &ctx))
                .catch_unwind()
                .await;
            let (status, message) = match outcome {
                Ok(report) => {
                    hunter_info!(
                        "job {} finished {}: {} ({} pages, {} scheduled, {} failed)",
                        id,
                        report.status,
                        report.message,
                        report.summary.pages,
                        report.summary.scheduled,
                        report.summary.failed
                    );
                    (report.status, report.message)
                }
                Err(_) => {
                    hunter_error!("job {} crawl panicked", id);
                    (JobStatus::Error, "internal error during crawl".to_string())
                }
            };
            if let Err(err) = registry.update(id, status, &message) {
                hunter_warn!("job {} final state not recorded: {}", id, err);
            }
        });

        let mut tasks = self.lock_tasks();
        tasks.retain(|_, task| !task.is_finished());
        tasks.insert(id, handle);

        Ok(id)
    }

    /// Extracts a query from `image`, then starts a job for it. Returns the id and the query used.
    pub async fn start_job_from_image(
        &self,
        image: &UploadedImage,
        requested: u64,
    ) -> Result<(JobId, String), OrchestratorError> {
        let keyword = self.extractor.extract(image).await;
        hunter_info!(
            "extracted query {:?} from upload {:?}",
            keyword,
            image.file_name
        );
        let id = self.start_job(&keyword, requested)?;
        Ok((id, keyword))
    }

    pub fn get_status(&self, id: JobId) -> Result<JobState, OrchestratorError> {
        self.registry.get(id).ok_or(OrchestratorError::NotFound(id))
    }

    /// Number of background crawls that have not finished yet.
    pub fn running_jobs(&self) -> usize {
        self.lock_tasks()
            .values()
            .filter(|task| !task.is_finished())
            .count()
    }

    /// Cancels every running crawl and waits for each to record its final state.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handles: Vec<(JobId, JoinHandle<()>)> = self.lock_tasks().drain().collect();
        if !handles.is_empty() {
            hunter_info!("waiting for {} job(s) to stop", handles.len());
        }
        for (id, handle) in handles {
            if let Err(err) = handle.await {
                hunter_warn!("job {} task did not stop cleanly: {}", id, err);
            }
        }
    }

    fn record(&self, id: JobId, status: JobStatus, message: &str) {
        if let Err(err) = self.registry.update(id, status, message) {
            hunter_warn!("job {} state not recorded: {}", id, err);
        }
    }

    fn lock_tasks(&self) -> MutexGuard<'_, HashMap<JobId, JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
