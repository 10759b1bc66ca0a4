//! Atomic file replacement.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};

/// Write `contents` to `path` so readers see either the old file or the
/// complete new one.
///
/// The data goes to `.<name>.<uuid>.tmp` next to the target, is synced and
/// then renamed over it. The temporary file is removed on any failure.
///
/// # Errors
///
/// Returns [`ServiceError::Write`] naming the target path.
pub(crate) fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> ServiceResult<()> {
    let write_error = |message: String| ServiceError::Write {
        path: path.to_path_buf(),
        message,
    };

    let file_name = path
        .file_name()
        .ok_or_else(|| write_error("path has no file name".to_string()))?;

    // Random suffix so a pre-created symlink cannot be followed
    let temp_name = format!(
        ".{}.{}.tmp",
        file_name.to_string_lossy(),
        Uuid::new_v4().simple()
    );
    let temp_path = path.with_file_name(temp_name);

    let result = (|| {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .map_err(|e| write_error(format!("failed to create temp file: {}", e)))?;

        file.write_all(contents)
            .map_err(|e| write_error(format!("failed to write content: {}", e)))?;
        file.set_permissions(fs::Permissions::from_mode(mode))
            .map_err(|e| write_error(format!("failed to set permissions: {}", e)))?;
        file.sync_all()
            .map_err(|e| write_error(format!("failed to sync file: {}", e)))?;

        fs::rename(&temp_path, path)
            .map_err(|e| write_error(format!("failed to rename temp file: {}", e)))
    })();

    match &result {
        Ok(()) => debug!(path = %path.display(), bytes = contents.len(), "File replaced"),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Atomic write failed");
            let _ = fs::remove_file(&temp_path);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("svc.service");

        write_atomic(&path, b"first", 0o644).unwrap();
        write_atomic(&path, b"second", 0o644).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        write_atomic(&dir.path().join("a.json"), b"{}", 0o644).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json".to_string()]);
    }

    #[test]
    fn test_write_atomic_missing_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("a.json");
        assert!(matches!(
            write_atomic(&path, b"{}", 0o644),
            Err(ServiceError::Write { .. })
        ));
    }
}
