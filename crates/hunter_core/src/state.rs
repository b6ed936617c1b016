use std::path::{Path, PathBuf};

use crate::candidate::MAX_ITEMS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrawlPhase {
    #[default]
    Idle,
    AwaitingPage,
    AwaitingBatch,
    Finished,
}

/// Counters reported when a crawl ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrawlSummary {
    pub pages: u32,
    pub scheduled: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Progress of one job's crawl. Mutated only through [`crate::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlState {
    target: usize,
    page_size: u32,
    next_page: u32,
    phase: CrawlPhase,
    output_dir: PathBuf,
    summary: CrawlSummary,
}

impl CrawlState {
    /// `target` is clamped to `MAX_ITEMS`; the page size is the smaller of the
    /// source's maximum and the target, but never zero.
    pub fn new(target: usize, source_max_page_size: u32, output_dir: impl Into<PathBuf>) -> Self {
        let target = target.min(MAX_ITEMS);
        let page_size = u32::try_from(target)
            .unwrap_or(u32::MAX)
            .min(source_max_page_size)
            .max(1);
        Self {
            target,
            page_size,
            next_page: 1,
            phase: CrawlPhase::Idle,
            output_dir: output_dir.into(),
            summary: CrawlSummary::default(),
        }
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn next_page(&self) -> u32 {
        self.next_page
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn summary(&self) -> CrawlSummary {
        self.summary
    }

    pub fn is_finished(&self) -> bool {
        self.phase == CrawlPhase::Finished
    }

    pub(crate) fn cap_reached(&self) -> bool {
        self.summary.scheduled >= self.target
    }

    pub(crate) fn set_phase(&mut self, phase: CrawlPhase) {
        self.phase = phase;
    }

    pub(crate) fn advance_page(&mut self) {
        self.summary.pages = self.next_page;
        self.next_page += 1;
    }

    pub(crate) fn take_index(&mut self) -> usize {
        let index = self.summary.scheduled;
        self.summary.scheduled += 1;
        index
    }

    pub(crate) fn record_batch(&mut self, succeeded: usize, failed: usize) {
        self.summary.succeeded += succeeded;
        self.summary.failed += failed;
    }
}
