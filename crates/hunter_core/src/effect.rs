use crate::{CandidateItem, JobStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    RequestPage { page: u32, page_size: u32 },
    FetchBatch { page: u32, items: Vec<CandidateItem> },
    Finish { status: JobStatus, message: String },
}
