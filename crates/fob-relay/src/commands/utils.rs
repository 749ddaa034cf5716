//! Shared helpers for command implementations.

use crate::broadcast::BuildSummary;
use crate::dev::snapshot;
use crate::error::{RelayError, Result};
use std::path::{Path, PathBuf};

/// Resolve a path relative to a working directory.
///
/// Absolute paths are returned unchanged.
pub fn resolve_path(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Snapshot `root` on the blocking pool.
pub async fn snapshot_site(root: PathBuf, ignore: Vec<String>) -> Result<BuildSummary> {
    tokio::task::spawn_blocking(move || snapshot(&root, &ignore))
        .await
        .map_err(|e| RelayError::Custom(format!("Snapshot task failed: {}", e)))
}

/// Whether `path` lies under any of `roots`.
pub fn is_under_any(path: &Path, roots: &[PathBuf]) -> bool {
    roots.iter().any(|root| path.starts_with(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_path_absolute() {
        let cwd = Path::new("/home/user/project");
        let path = Path::new("/srv/public");
        assert_eq!(resolve_path(path, cwd), PathBuf::from("/srv/public"));
    }

    #[test]
    fn test_resolve_path_relative() {
        let cwd = Path::new("/home/user/project");
        let path = Path::new("public");
        assert_eq!(
            resolve_path(path, cwd),
            PathBuf::from("/home/user/project/public")
        );
    }

    #[test]
    fn test_is_under_any() {
        let roots = vec![PathBuf::from("/srv/static"), PathBuf::from("/srv/fonts")];
        assert!(is_under_any(Path::new("/srv/static/logo.svg"), &roots));
        assert!(!is_under_any(Path::new("/srv/staticky/logo.svg"), &roots));
        assert!(!is_under_any(Path::new("/srv/public/index.html"), &[]));
    }

    #[tokio::test]
    async fn test_snapshot_site_runs_off_thread() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<p>hi</p>").unwrap();

        let summary = snapshot_site(dir.path().to_path_buf(), Vec::new())
            .await
            .unwrap();
        assert!(summary.is_clean());
        assert!(!summary.hash.is_empty());
    }
}
