use std::path::{Path, PathBuf};
use std::process::Stdio;

use tracing::debug;

use crate::error::PreconditionError;

const TOOL: &str = "ffmpeg";

fn bin_name(tool: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{}.exe", tool)
    } else {
        tool.to_string()
    }
}

/// Find the media tool: next to the working directory, then in `tools/`,
/// otherwise rely on `PATH`
pub fn locate_remux_tool(base: &Path) -> PathBuf {
    let name = bin_name(TOOL);
    [base.join(&name), base.join("tools").join(&name)]
        .into_iter()
        .find(|candidate| candidate.is_file())
        .inspect(|found| debug!(tool = %found.display(), "Using bundled media tool"))
        .unwrap_or_else(|| PathBuf::from(name))
}

/// Make sure the media tool runs and identifies itself
pub async fn check_remux_tool(tool: &Path) -> Result<(), PreconditionError> {
    let unavailable = || PreconditionError::RemuxToolUnavailable(tool.to_path_buf());

    let output = tokio::process::Command::new(tool)
        .arg("-version")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await
        .map_err(|_| unavailable())?;

    let banner = String::from_utf8_lossy(&output.stdout);
    if output.status.success() && banner.contains("ffmpeg version") {
        Ok(())
    } else {
        Err(unavailable())
    }
}
