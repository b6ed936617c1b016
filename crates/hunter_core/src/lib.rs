//! Image hunter core: job model, candidate naming and the pure crawl state machine.
mod candidate;
mod effect;
mod job;
mod msg;
mod state;
mod update;

pub use candidate::{
    candidate_filename, clamp_max_items, infer_extension, CandidateItem, DEFAULT_EXTENSION,
    DEFAULT_ITEMS, MAX_ITEMS,
};
pub use effect::Effect;
pub use job::{JobId, JobState, JobStatus, TransitionError};
pub use msg::Msg;
pub use state::{CrawlPhase, CrawlState, CrawlSummary};
pub use update::update;
