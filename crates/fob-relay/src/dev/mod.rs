//! Static-site dev server pieces used by `fob-relay serve`.
//!
//! - [`site`] hashes the served directory into a [`BuildSummary`] and serves
//!   it with the relay client injected into HTML pages
//! - [`watcher`] reports debounced file changes under the root
//!
//! [`BuildSummary`]: crate::broadcast::BuildSummary

pub mod site;
pub mod watcher;

pub use site::{snapshot, MAX_FILE_SIZE};
pub use watcher::{FileChange, FileWatcher};
