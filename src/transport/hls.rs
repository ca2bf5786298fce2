use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tracing::debug;

use super::{DownloadContext, Transport};
use crate::error::TransportError;
use crate::http::HttpClient;
use crate::progress::ProgressEvent;

/// HLS playlist remuxed into an mp4 container by the external media tool
#[derive(Clone)]
pub struct HlsTransport<C> {
    client: C,
    tool: PathBuf,
}

impl<C: HttpClient> HlsTransport<C> {
    pub fn new(client: C, tool: PathBuf) -> Self {
        Self { client, tool }
    }
}

/// Media tool arguments: reconnect on interrupted streams, copy codecs,
/// convert ADTS audio framing for the mp4 container, overwrite leftovers
pub fn remux_args(hls_url: &str, destination: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-y",
        "-reconnect",
        "1",
        "-reconnect_streamed",
        "1",
        "-reconnect_delay_max",
        "30",
        "-i",
        hls_url,
        "-c",
        "copy",
        "-bsf:a",
        "aac_adtstoasc",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(destination.as_os_str().to_owned());
    args
}

/// Last non-empty line of the tool's diagnostic output
fn last_line(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[async_trait]
impl<C: HttpClient> Transport for HlsTransport<C> {
    async fn attempt(
        &self,
        source_url: &str,
        destination: &Path,
        context: &DownloadContext,
    ) -> Result<u64, TransportError> {
        let status = self
            .client
            .head(source_url)
            .await
            .map_err(|e| TransportError::HttpFailed {
                url: source_url.to_string(),
                source: e,
            })?;
        if status != 200 {
            return Err(TransportError::HttpStatus {
                url: source_url.to_string(),
                status,
            });
        }

        context.reporter.report(ProgressEvent::DownloadStarting {
            download_id: context.download_id,
            title: context.title.clone(),
            content_length: None,
        });

        debug!(tool = %self.tool.display(), url = source_url, "Starting remux");
        let output = tokio::process::Command::new(&self.tool)
            .args(remux_args(source_url, destination))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TransportError::RemuxSpawnFailed {
                tool: self.tool.clone(),
                source: e,
            })?;

        if !output.status.success() {
            let detail = last_line(&output.stderr);
            return Err(TransportError::RemuxFailed {
                url: source_url.to_string(),
                status: if detail.is_empty() {
                    output.status.to_string()
                } else {
                    format!("{}: {}", output.status, detail)
                },
            });
        }

        let written = tokio::fs::metadata(destination)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if written == 0 {
            return Err(TransportError::EmptyOutput(destination.to_path_buf()));
        }

        Ok(written)
    }
}
