use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use super::{DownloadContext, Transport};
use crate::error::TransportError;
use crate::http::HttpClient;
use crate::progress::ProgressEvent;

/// Write buffer size for streamed downloads
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Plain HTTP download, streamed to disk in fixed-size chunks
#[derive(Clone)]
pub struct DirectTransport<C> {
    client: C,
}

impl<C: HttpClient> DirectTransport<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: HttpClient> Transport for DirectTransport<C> {
    async fn attempt(
        &self,
        source_url: &str,
        destination: &Path,
        context: &DownloadContext,
    ) -> Result<u64, TransportError> {
        let http_failed = |e: reqwest::Error| TransportError::HttpFailed {
            url: source_url.to_string(),
            source: e,
        };

        // Existence probe; nothing is fetched unless the host answers 200
        let status = self.client.head(source_url).await.map_err(http_failed)?;
        if status != 200 {
            return Err(TransportError::HttpStatus {
                url: source_url.to_string(),
                status,
            });
        }

        let response = self
            .client
            .get_stream(source_url)
            .await
            .map_err(http_failed)?;

        if response.status >= 400 {
            return Err(TransportError::HttpStatus {
                url: source_url.to_string(),
                status: response.status,
            });
        }

        context.reporter.report(ProgressEvent::DownloadStarting {
            download_id: context.download_id,
            title: context.title.clone(),
            content_length: response.content_length,
        });

        let file = File::create(destination)
            .await
            .map_err(|e| TransportError::FileCreateFailed {
                path: destination.to_path_buf(),
                source: e,
            })?;
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);

        let mut bytes_downloaded: u64 = 0;
        let mut stream = response.body;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| TransportError::StreamFailed {
                url: source_url.to_string(),
                source: e,
            })?;

            writer
                .write_all(&chunk)
                .await
                .map_err(|e| TransportError::FileWriteFailed {
                    path: destination.to_path_buf(),
                    source: e,
                })?;

            bytes_downloaded += chunk.len() as u64;

            context.reporter.report(ProgressEvent::DownloadProgress {
                download_id: context.download_id,
                title: context.title.clone(),
                bytes_downloaded,
                total_bytes: response.content_length,
            });
        }

        writer
            .flush()
            .await
            .map_err(|e| TransportError::FileWriteFailed {
                path: destination.to_path_buf(),
                source: e,
            })?;

        let written = tokio::fs::metadata(destination)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if written == 0 {
            return Err(TransportError::EmptyOutput(destination.to_path_buf()));
        }

        Ok(bytes_downloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ByteStream, HttpResponse};
    use crate::ledger::RunLedger;
    use crate::progress::NoopReporter;
    use crate::transport::{RetryPolicy, fetch};
    use bytes::Bytes;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct MockHttpClient {
        head_status: u16,
        response_data: Vec<u8>,
        head_calls: AtomicUsize,
        get_calls: AtomicUsize,
    }

    impl MockHttpClient {
        fn new(head_status: u16, response_data: &[u8]) -> Self {
            Self {
                head_status,
                response_data: response_data.to_vec(),
                head_calls: AtomicUsize::new(0),
                get_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn head(&self, _url: &str) -> Result<u16, reqwest::Error> {
            self.head_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.head_status)
        }

        async fn get_bytes(&self, _url: &str) -> Result<Bytes, reqwest::Error> {
            Ok(Bytes::from(self.response_data.clone()))
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            let data = self.response_data.clone();
            let len = data.len() as u64;

            let stream: ByteStream =
                Box::pin(futures::stream::once(async move { Ok(Bytes::from(data)) }));

            Ok(HttpResponse {
                status: 200,
                content_length: Some(len),
                body: stream,
            })
        }
    }

    fn context(ledger: Arc<RunLedger>) -> DownloadContext {
        DownloadContext {
            download_id: 0,
            title: "demo-1".to_string(),
            reporter: NoopReporter::shared(),
            ledger,
            retry: RetryPolicy::default(),
        }
    }

    #[tokio::test]
    async fn attempt_writes_file() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("demo-1.mp4");
        let transport = DirectTransport::new(MockHttpClient::new(200, b"test video content"));
        let ledger = Arc::new(RunLedger::new(dir.path()));

        let bytes = transport
            .attempt("https://cdn/v.mp4", &destination, &context(ledger))
            .await
            .unwrap();

        assert_eq!(bytes, 18);
        assert_eq!(std::fs::read(&destination).unwrap(), b"test video content");
    }

    #[tokio::test]
    async fn bad_probe_fails_without_get() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("demo-1.mp4");
        let transport = DirectTransport::new(MockHttpClient::new(404, b"data"));
        let ledger = Arc::new(RunLedger::new(dir.path()));

        let result = transport
            .attempt("https://cdn/v.mp4", &destination, &context(ledger))
            .await;

        match result.unwrap_err() {
            TransportError::HttpStatus { status, .. } => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus error, got {other:?}"),
        }
        assert_eq!(transport.client.head_calls.load(Ordering::SeqCst), 1);
        assert_eq!(transport.client.get_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_body_is_failure() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("demo-1.mp4");
        let transport = DirectTransport::new(MockHttpClient::new(200, b""));
        let ledger = Arc::new(RunLedger::new(dir.path()));

        let result = transport
            .attempt("https://cdn/v.mp4", &destination, &context(ledger))
            .await;

        assert!(matches!(result, Err(TransportError::EmptyOutput(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn three_bad_probes_record_one_failure() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("demo-1.mp4");
        let transport = DirectTransport::new(MockHttpClient::new(403, b"data"));
        let ledger = Arc::new(RunLedger::new(dir.path()));

        let ok = fetch(&transport, "https://cdn/v.mp4", &destination, &context(ledger.clone())).await;

        assert!(!ok);
        assert_eq!(transport.client.head_calls.load(Ordering::SeqCst), 3);
        assert_eq!(transport.client.get_calls.load(Ordering::SeqCst), 0);
        assert!(!destination.exists());
        assert_eq!(ledger.failed(), vec![destination]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_downloads_are_cleaned_up_after_retries() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("demo-1.mp4");
        let transport = DirectTransport::new(MockHttpClient::new(200, b""));
        let ledger = Arc::new(RunLedger::new(dir.path()));

        let ok = fetch(&transport, "https://cdn/v.mp4", &destination, &context(ledger.clone())).await;

        assert!(!ok);
        assert_eq!(transport.client.get_calls.load(Ordering::SeqCst), 3);
        assert!(!destination.exists());
        assert_eq!(ledger.failed().len(), 1);
    }
}
