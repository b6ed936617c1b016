use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hunter_core::{JobId, JobState, JobStatus, TransitionError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("job {0} not found")]
    NotFound(JobId),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Shared job table. Safe for concurrent readers and a single writer per job.
pub trait JobRegistry: Send + Sync {
    /// Allocates a fresh id in the `running` state.
    fn create(&self) -> JobId;

    /// Moves a job forward. Terminal states cannot be left.
    fn update(&self, id: JobId, status: JobStatus, message: &str) -> Result<(), RegistryError>;

    fn get(&self, id: JobId) -> Option<JobState>;
}

#[derive(Debug, Default)]
pub struct InMemoryJobRegistry {
    jobs: DashMap<JobId, JobState>,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl JobRegistry for InMemoryJobRegistry {
    fn create(&self) -> JobId {
        loop {
            let id = JobId::new();
            if let Entry::Vacant(slot) = self.jobs.entry(id) {
                slot.insert(JobState::running());
                return id;
            }
        }
    }

    fn update(&self, id: JobId, status: JobStatus, message: &str) -> Result<(), RegistryError> {
        let mut job = self.jobs.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
        job.transition(status, message)?;
        Ok(())
    }

    fn get(&self, id: JobId) -> Option<JobState> {
        self.jobs.get(&id).map(|job| job.clone())
    }
}
