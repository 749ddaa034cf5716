//! File system watcher with debouncing for the `serve` command.
//!
//! Watches the site root (and any extra static paths) recursively and filters
//! changes against the configured ignore patterns.

use crate::error::{RelayError, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// File change event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    /// Get the path affected by this change.
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }
}

/// File watcher with debouncing and filtering.
///
/// Change events are delivered through the channel returned by
/// [`FileWatcher::new`]; repeated events for the same file inside the
/// debounce window are dropped.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl FileWatcher {
    /// Watch every path in `roots` recursively.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::FileNotFound`] if a root does not exist and
    /// [`RelayError::Watch`] if the platform watcher cannot be created.
    pub fn new(
        roots: Vec<PathBuf>,
        ignore_patterns: Vec<String>,
        debounce_ms: u64,
    ) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        if let Some(missing) = roots.iter().find(|root| !root.exists()) {
            return Err(RelayError::FileNotFound(missing.clone()));
        }

        let (tx, rx) = mpsc::channel(100);

        let debounce_duration = Duration::from_millis(debounce_ms);
        let mut last_event: Option<(PathBuf, Instant)> = None;
        let filter_roots = roots.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            for path in &event.paths {
                if should_ignore(path, &filter_roots, &ignore_patterns) {
                    continue;
                }

                let now = Instant::now();
                if let Some((last_path, last_time)) = &last_event {
                    if last_path == path && now.duration_since(*last_time) < debounce_duration {
                        continue;
                    }
                }
                last_event = Some((path.clone(), now));

                let change = match event.kind {
                    notify::EventKind::Create(_) => FileChange::Created(path.clone()),
                    notify::EventKind::Modify(_) => FileChange::Modified(path.clone()),
                    notify::EventKind::Remove(_) => FileChange::Removed(path.clone()),
                    _ => continue,
                };

                // The serve loop is gone once the receiver is dropped.
                if tx.blocking_send(change).is_err() {
                    return;
                }
            }
        })?;

        for root in &roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
        }

        Ok((
            Self {
                _watcher: watcher,
                roots,
            },
            rx,
        ))
    }

    /// Directories and files being watched.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

/// Whether a change at `path` is outside every root or matches an ignore pattern.
pub(crate) fn should_ignore(path: &Path, roots: &[PathBuf], ignore_patterns: &[String]) -> bool {
    let Some(rel_path) = roots.iter().find_map(|root| path.strip_prefix(root).ok()) else {
        return true;
    };
    is_ignored(rel_path, ignore_patterns)
}

/// Match a root-relative path against ignore patterns and hidden components.
///
/// Patterns are either `*.ext` suffixes or directory/file names matched
/// against any path component.
pub(crate) fn is_ignored(rel_path: &Path, ignore_patterns: &[String]) -> bool {
    let path_str = rel_path.to_string_lossy();

    for pattern in ignore_patterns {
        if let Some(suffix) = pattern.strip_prefix('*') {
            if path_str.ends_with(suffix) {
                return true;
            }
        } else if rel_path
            .components()
            .any(|component| component.as_os_str() == pattern.as_str())
        {
            return true;
        }
    }

    rel_path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| name.starts_with('.') && name != "." && name != "..")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots() -> Vec<PathBuf> {
        vec![PathBuf::from("/project")]
    }

    #[test]
    fn test_should_ignore_node_modules() {
        let patterns = vec!["node_modules".to_string()];

        let path = PathBuf::from("/project/node_modules/package/index.js");
        assert!(should_ignore(&path, &roots(), &patterns));

        let path = PathBuf::from("/project/src/index.js");
        assert!(!should_ignore(&path, &roots(), &patterns));
    }

    #[test]
    fn test_directory_pattern_matches_whole_components() {
        let patterns = vec!["build".to_string()];

        let path = PathBuf::from("/project/build/app.js");
        assert!(should_ignore(&path, &roots(), &patterns));

        let path = PathBuf::from("/project/rebuild.html");
        assert!(!should_ignore(&path, &roots(), &patterns));
    }

    #[test]
    fn test_should_ignore_extension() {
        let patterns = vec!["*.log".to_string()];

        let path = PathBuf::from("/project/debug.log");
        assert!(should_ignore(&path, &roots(), &patterns));

        let path = PathBuf::from("/project/src/index.js");
        assert!(!should_ignore(&path, &roots(), &patterns));
    }

    #[test]
    fn test_should_ignore_hidden_files() {
        let path = PathBuf::from("/project/.git/config");
        assert!(should_ignore(&path, &roots(), &[]));

        let path = PathBuf::from("/project/.env");
        assert!(should_ignore(&path, &roots(), &[]));

        let path = PathBuf::from("/project/src/.hidden/file.js");
        assert!(should_ignore(&path, &roots(), &[]));
    }

    #[test]
    fn test_should_ignore_outside_roots() {
        let path = PathBuf::from("/other/file.js");
        assert!(should_ignore(&path, &roots(), &[]));

        let extra = vec![PathBuf::from("/project"), PathBuf::from("/shared")];
        assert!(!should_ignore(&PathBuf::from("/shared/logo.svg"), &extra, &[]));
    }

    #[test]
    fn test_missing_root_is_file_not_found() {
        let result = FileWatcher::new(vec![PathBuf::from("/definitely/not/here")], vec![], 100);
        assert!(matches!(result, Err(RelayError::FileNotFound(_))));
    }

    #[test]
    fn test_file_change_path() {
        let path = PathBuf::from("/project/src/index.js");

        assert_eq!(FileChange::Modified(path.clone()).path(), path.as_path());
        assert_eq!(FileChange::Created(path.clone()).path(), path.as_path());
        assert_eq!(FileChange::Removed(path.clone()).path(), path.as_path());
    }
}
