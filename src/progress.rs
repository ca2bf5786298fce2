use std::sync::Arc;
use std::time::Duration;

/// Events emitted during a run for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Show metadata has been collected from the catalog
    ShowResolved {
        name: String,
        year: String,
        season_count: u32,
    },

    /// A season or movie group is about to be processed
    GroupStarted { label: String, item_count: u32 },

    /// An item was not dispatched (already present, no link, no cache URL)
    ItemSkipped { title: String, reason: String },

    /// The burst quota is used up; the scheduler sleeps
    Cooldown { duration: Duration },

    /// The scheduler waits for running downloads to drop below the ceiling
    WaitingForSlots { live: usize, limit: usize },

    /// A download is starting
    DownloadStarting {
        /// Identifies the download task within the run
        download_id: usize,
        title: String,
        /// Expected content length in bytes, if known
        content_length: Option<u64>,
    },

    /// Download progress update
    DownloadProgress {
        download_id: usize,
        title: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// An attempt failed and will be retried after a pause
    DownloadRetrying {
        download_id: usize,
        title: String,
        attempt: u32,
        wait: Duration,
    },

    /// A download completed successfully
    DownloadCompleted {
        download_id: usize,
        title: String,
        bytes_downloaded: u64,
    },

    /// A download failed for good
    DownloadFailed {
        download_id: usize,
        title: String,
        error: String,
    },

    /// All tasks of a group have been joined
    GroupFinished {
        label: String,
        succeeded: usize,
        failed: usize,
    },

    /// Run completed
    RunCompleted {
        downloaded_count: usize,
        skipped_count: usize,
        failed_count: usize,
    },
}

/// Trait for reporting progress events during a run.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}
