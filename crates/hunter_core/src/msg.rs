/// Inputs to the crawl state machine, produced by the engine's effect runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// The job's background task started.
    Start,
    /// The image source answered a page request with these candidate URLs.
    PageLoaded { page: u32, urls: Vec<String> },
    /// The image source answered with a non-2xx status.
    PageRejected { page: u32, status: u16 },
    /// The page request failed before a status was received.
    PageFailed { page: u32, reason: String },
    /// Every fetch of the current batch has finished.
    BatchFinished { succeeded: usize, failed: usize },
    /// The job was stopped from outside (deadline or shutdown).
    Aborted { reason: String },
}
