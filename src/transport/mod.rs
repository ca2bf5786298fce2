//! Download strategies for resolved cache URLs.
//!
//! Both strategies share one outer retry loop ([`fetch`]): a failed attempt is
//! retried after `step * attempt` seconds, and after the last attempt the
//! partial output is deleted and the destination is recorded as failed.

mod direct;
mod hls;
mod tool;

pub use direct::{CHUNK_SIZE, DirectTransport};
pub use hls::{HlsTransport, remux_args};
pub use tool::{check_remux_tool, locate_remux_tool};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::config::TransportKind;
use crate::error::TransportError;
use crate::ledger::RunLedger;
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// Outer retry policy of a transport
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Wait after attempt `n` is `backoff_step * n`
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Wait after the given (1-based) failed attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }
}

/// Everything a download task needs besides the URL and destination
#[derive(Clone)]
pub struct DownloadContext {
    /// Identifies the download task within the run
    pub download_id: usize,
    /// Human readable label for progress output
    pub title: String,
    pub reporter: SharedProgressReporter,
    pub ledger: Arc<RunLedger>,
    pub retry: RetryPolicy,
}

/// A single download attempt
#[async_trait]
pub trait Transport: Send + Sync {
    /// Download `source_url` to `destination`, returning the bytes written
    async fn attempt(
        &self,
        source_url: &str,
        destination: &Path,
        context: &DownloadContext,
    ) -> Result<u64, TransportError>;
}

/// One transport per [`TransportKind`]
#[derive(Clone)]
pub struct Transports {
    pub direct: Arc<dyn Transport>,
    pub hls: Arc<dyn Transport>,
}

impl Transports {
    pub fn for_kind(&self, kind: TransportKind) -> Arc<dyn Transport> {
        match kind {
            TransportKind::Direct => self.direct.clone(),
            TransportKind::Hls => self.hls.clone(),
        }
    }
}

/// Run a transport with the outer retry policy.
///
/// Never fails: the outcome is the return value plus a ledger record.
pub async fn fetch(
    transport: &dyn Transport,
    source_url: &str,
    destination: &Path,
    context: &DownloadContext,
) -> bool {
    let max_attempts = context.retry.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        debug!(
            attempt,
            max_attempts,
            url = source_url,
            path = %destination.display(),
            "Starting download attempt"
        );

        let err = match transport.attempt(source_url, destination, context).await {
            Ok(bytes_downloaded) => {
                info!(path = %destination.display(), bytes_downloaded, "Finished download");
                context.ledger.record_success(destination);
                context.reporter.report(ProgressEvent::DownloadCompleted {
                    download_id: context.download_id,
                    title: context.title.clone(),
                    bytes_downloaded,
                });
                return true;
            }
            Err(e) => e,
        };

        warn!(attempt, error = %err, "Download attempt failed");

        if attempt < max_attempts {
            let wait = context.retry.delay_after(attempt);
            info!(wait_secs = wait.as_secs(), "Retrying download");
            context.reporter.report(ProgressEvent::DownloadRetrying {
                download_id: context.download_id,
                title: context.title.clone(),
                attempt,
                wait,
            });
            tokio::time::sleep(wait).await;
        } else {
            error!(
                path = %destination.display(),
                attempts = max_attempts,
                error = %err,
                "Failed to download"
            );
            let _ = tokio::fs::remove_file(destination).await;
            context.ledger.record_failure(destination);
            context.reporter.report(ProgressEvent::DownloadFailed {
                download_id: context.download_id,
                title: context.title.clone(),
                error: err.to_string(),
            });
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopReporter;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::tempdir;

    /// Fails a fixed number of times, then writes the file
    struct FlakyTransport {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn attempt(
            &self,
            source_url: &str,
            destination: &Path,
            _context: &DownloadContext,
        ) -> Result<u64, TransportError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::fs::write(destination, b"partial").await.unwrap();
            if call <= self.failures {
                return Err(TransportError::HttpStatus {
                    url: source_url.to_string(),
                    status: 503,
                });
            }
            Ok(7)
        }
    }

    fn context(ledger: Arc<RunLedger>) -> DownloadContext {
        DownloadContext {
            download_id: 0,
            title: "demo - s01e01".to_string(),
            reporter: NoopReporter::shared(),
            ledger,
            retry: RetryPolicy::default(),
        }
    }

    #[test]
    fn backoff_grows_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(20));
        assert_eq!(policy.delay_after(2), Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("a.mp4");
        let ledger = Arc::new(RunLedger::new(dir.path()));
        let transport = FlakyTransport {
            failures: 2,
            calls: AtomicU32::new(0),
        };

        let start = tokio::time::Instant::now();
        let ok = fetch(&transport, "https://x/a", &destination, &context(ledger.clone())).await;

        assert!(ok);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_secs(60));
        assert_eq!(ledger.succeeded(), vec![destination.clone()]);
        assert!(ledger.failed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_removes_output_and_records_failure_once() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("a.mp4");
        let ledger = Arc::new(RunLedger::new(dir.path()));
        let transport = FlakyTransport {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
        };

        let ok = fetch(&transport, "https://x/a", &destination, &context(ledger.clone())).await;

        assert!(!ok);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert!(!destination.exists());
        assert_eq!(ledger.failed(), vec![destination.clone()]);
        assert!(ledger.succeeded().is_empty());
    }
}
