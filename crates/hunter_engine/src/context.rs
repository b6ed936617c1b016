use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a job stopped before its crawl finished on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Cancelled => write!(f, "job cancelled: server shutting down"),
            AbortReason::DeadlineExceeded => write!(f, "job deadline exceeded"),
        }
    }
}

/// Cancellation and deadline shared by every network call of one job.
#[derive(Debug, Clone)]
pub struct JobContext {
    cancel: CancellationToken,
    deadline: Instant,
}

impl JobContext {
    pub fn new(cancel: CancellationToken, budget: Duration) -> Self {
        Self {
            cancel,
            deadline: Instant::now() + budget,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Runs `work` until it completes, the token is cancelled, or the deadline passes.
    pub async fn guard<F: Future>(&self, work: F) -> Result<F::Output, AbortReason> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AbortReason::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => Err(AbortReason::DeadlineExceeded),
            output = work => Ok(output),
        }
    }
}
