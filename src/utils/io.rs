//! File I/O primitives with consistent error handling.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Read file contents with standardized error handling.
///
/// Wraps `fs::read_to_string` with consistent `Error::internal_io` formatting.
pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Create `path` and any missing parents.
pub fn create_dir_all(path: &Path, operation: &str) -> Result<()> {
    fs::create_dir_all(path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Remove a directory tree if it exists.
pub fn remove_dir_if_exists(path: &Path, operation: &str) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    fs::remove_dir_all(path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Recursively copy `src` into `dst`, overlaying whatever `dst` holds.
///
/// Directories are created as needed and existing files are overwritten.
/// Files present only in `dst` are left alone. Returns the number of files
/// copied.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    let metadata = fs::metadata(src).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", src.display())))
    })?;
    if !metadata.is_dir() {
        return Err(Error::internal_io(
            format!("{} is not a directory", src.display()),
            Some("copy tree".to_string()),
        ));
    }

    create_dir_all(dst, &format!("create {}", dst.display()))?;

    let entries = fs::read_dir(src).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("list {}", src.display())))
    })?;

    let mut copied = 0;
    for entry in entries {
        let entry = entry.map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("list {}", src.display())))
        })?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("stat {}", from.display())))
        })?;

        if file_type.is_dir() {
            copied += copy_tree(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(|e| {
                Error::internal_io(
                    e.to_string(),
                    Some(format!("copy {} to {}", from.display(), to.display())),
                )
            })?;
            copied += 1;
        }
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn read_file_succeeds_for_existing_file() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "test content").unwrap();

        let content = read_file(temp.path(), "test read").unwrap();
        assert!(content.contains("test content"));
    }

    #[test]
    fn read_file_returns_error_for_missing_file() {
        let err = read_file(Path::new("/nonexistent/path.txt"), "test read").unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
    }

    #[test]
    fn copy_tree_overlays_destination() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("nested")).unwrap();
        fs::write(src.path().join("a.txt"), "H").unwrap();
        fs::write(src.path().join("nested/b.txt"), "H2").unwrap();
        fs::write(dst.path().join("a.txt"), "T").unwrap();
        fs::write(dst.path().join("keep.txt"), "K").unwrap();

        let copied = copy_tree(src.path(), dst.path()).unwrap();

        assert_eq!(copied, 2);
        assert_eq!(fs::read_to_string(dst.path().join("a.txt")).unwrap(), "H");
        assert_eq!(fs::read_to_string(dst.path().join("nested/b.txt")).unwrap(), "H2");
        assert_eq!(fs::read_to_string(dst.path().join("keep.txt")).unwrap(), "K");
    }

    #[test]
    fn copy_tree_rejects_missing_source() {
        let dst = tempfile::tempdir().unwrap();
        let err = copy_tree(Path::new("/nonexistent/handler"), dst.path()).unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
    }

    #[test]
    fn remove_dir_if_exists_tolerates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("build");
        assert!(remove_dir_if_exists(&target, "clear").is_ok());

        fs::create_dir_all(target.join("x")).unwrap();
        remove_dir_if_exists(&target, "clear").unwrap();
        assert!(!target.exists());
    }
}
