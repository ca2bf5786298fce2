use std::fs::OpenOptions;
use std::path::Path;

use tracing::{debug, info};

use crate::error::PreconditionError;

/// Content written to a freshly created guard file
const GUARD_CONTENT: &str = "This file is used to check folder permissions. Do not delete it.\n";

/// Check whether a destination already holds a finished download
///
/// A zero-byte file is a leftover from an interrupted attempt; it is removed
/// so the item gets downloaded again.
pub fn already_downloaded(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.len() > 0 => {
            info!(path = %path.display(), "Already downloaded");
            true
        }
        Ok(_) => {
            debug!(path = %path.display(), "File exists but is empty, removing it");
            let _ = std::fs::remove_file(path);
            false
        }
        Err(_) => {
            debug!(path = %path.display(), "File not downloaded yet");
            false
        }
    }
}

/// Verify read and write access on the guard file, creating it if absent
pub fn check_guard_file(path: &Path) -> Result<(), PreconditionError> {
    if !path.exists() {
        info!(path = %path.display(), "Creating permission guard file");
        std::fs::write(path, GUARD_CONTENT)
            .map_err(|_| PreconditionError::NoWritePermission(path.to_path_buf()))?;
    }

    OpenOptions::new()
        .read(true)
        .open(path)
        .map_err(|_| PreconditionError::NoReadPermission(path.to_path_buf()))?;
    debug!("We have read permission");

    OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|_| PreconditionError::NoWritePermission(path.to_path_buf()))?;
    debug!("We have write permission");

    Ok(())
}

/// Create a directory and its parents
pub fn ensure_dir(path: &Path) -> Result<(), PreconditionError> {
    std::fs::create_dir_all(path).map_err(|e| PreconditionError::CreateDirectoryFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn non_empty_file_counts_as_downloaded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("episode.mp4");
        std::fs::write(&path, b"video").unwrap();

        assert!(already_downloaded(&path));
        assert!(path.exists());
    }

    #[test]
    fn empty_file_is_removed_and_not_downloaded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("episode.mp4");
        std::fs::write(&path, b"").unwrap();

        assert!(!already_downloaded(&path));
        assert!(!path.exists());
    }

    #[test]
    fn missing_file_is_not_downloaded() {
        let dir = tempdir().unwrap();
        assert!(!already_downloaded(&dir.path().join("nope.mp4")));
    }

    #[test]
    fn guard_file_is_created_when_missing() {
        let dir = tempdir().unwrap();
        let guard = dir.path().join("DO_NOT_DELETE.txt");

        check_guard_file(&guard).unwrap();
        assert!(guard.exists());
        check_guard_file(&guard).unwrap();
    }

    #[test]
    fn guard_file_in_missing_directory_is_fatal() {
        let dir = tempdir().unwrap();
        let guard = dir.path().join("missing").join("DO_NOT_DELETE.txt");

        let result = check_guard_file(&guard);
        assert!(matches!(result, Err(PreconditionError::NoWritePermission(_))));
    }

    #[test]
    fn ensure_dir_creates_nested_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("anime").join("demo_(2020)").join("Season 01");

        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
