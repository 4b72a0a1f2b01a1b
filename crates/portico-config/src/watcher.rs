//! Configuration file watching for hot reload.
//!
//! The watcher observes the file's parent directory, so editors that save by
//! writing a temporary file and renaming it over the original are still
//! seen. Events for other files in the directory are ignored.
//!
//! Debouncing is trailing-edge: a change is reported once the file has been
//! quiet for a full debounce window, so an editor that truncates and then
//! writes produces one event after the final write.
//!
//! ```no_run
//! use portico_config::FileWatcher;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), portico_config::ConfigError> {
//! let mut watcher = FileWatcher::builder("gateway.toml")
//!     .with_debounce(Duration::from_millis(500))
//!     .build()?;
//!
//! while let Some(change) = watcher.next().await {
//!     println!("{} changed ({:?})", change.path.display(), change.kind);
//! }
//! # Ok(())
//! # }
//! ```

use crate::ConfigError;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::timeout_at;

/// A change to the watched file.
#[derive(Debug, Clone)]
pub struct FileChangeEvent {
    /// The watched file.
    pub path: PathBuf,
    /// What happened.
    pub kind: FileChangeKind,
    /// When the file settled.
    pub timestamp: Instant,
}

/// Kind of file change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    /// File was created (including by rename).
    Created,
    /// File contents changed.
    Modified,
    /// File was removed.
    Deleted,
}

impl FileChangeKind {
    fn from_event(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(Self::Created),
            EventKind::Modify(_) => Some(Self::Modified),
            EventKind::Remove(_) => Some(Self::Deleted),
            EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
        }
    }
}

/// Builder for [`FileWatcher`].
#[derive(Debug)]
pub struct FileWatcherBuilder {
    path: PathBuf,
    debounce: Duration,
}

impl FileWatcherBuilder {
    /// Sets the debounce window. Defaults to 500ms.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Starts watching.
    pub fn build(self) -> Result<FileWatcher, ConfigError> {
        if !self.path.exists() {
            return Err(ConfigError::file_not_found(&self.path));
        }
        let file_name = self
            .path
            .file_name()
            .map(ToOwned::to_owned)
            .ok_or_else(|| ConfigError::Watch(format!("{} is not a file", self.path.display())))?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, rx) = mpsc::channel(64);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                // A full channel already holds a pending reload.
                let _ = tx.try_send(event);
            }
        })
        .map_err(|e| ConfigError::Watch(format!("failed to create watcher: {e}")))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| ConfigError::Watch(format!("failed to watch {}: {e}", dir.display())))?;

        tracing::debug!(path = %self.path.display(), "watching configuration file");
        Ok(FileWatcher {
            _watcher: watcher,
            rx,
            path: self.path,
            file_name,
            debounce: self.debounce,
        })
    }
}

/// Watches one configuration file.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<Event>,
    path: PathBuf,
    file_name: OsString,
    debounce: Duration,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("path", &self.path)
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl FileWatcher {
    /// Creates a builder for `path`.
    pub fn builder(path: impl AsRef<Path>) -> FileWatcherBuilder {
        FileWatcherBuilder {
            path: path.as_ref().to_path_buf(),
            debounce: Duration::from_millis(500),
        }
    }

    /// Returns the watched path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Waits for the next change and for the file to settle.
    ///
    /// Every relevant event restarts the debounce window; the reported kind
    /// is that of the last one. Returns `None` when the underlying watcher
    /// stops.
    pub async fn next(&mut self) -> Option<FileChangeEvent> {
        let mut kind = loop {
            let event = self.rx.recv().await?;
            if let Some(kind) = self.relevant(&event) {
                break kind;
            }
        };

        let mut deadline = tokio::time::Instant::now() + self.debounce;
        loop {
            match timeout_at(deadline, self.rx.recv()).await {
                Ok(Some(event)) => {
                    if let Some(later) = self.relevant(&event) {
                        kind = later;
                        deadline = tokio::time::Instant::now() + self.debounce;
                    }
                }
                // Closed mid-window: report what is pending, the next call
                // returns `None`.
                Ok(None) | Err(_) => break,
            }
        }

        Some(FileChangeEvent {
            path: self.path.clone(),
            kind,
            timestamp: Instant::now(),
        })
    }

    fn relevant(&self, event: &Event) -> Option<FileChangeKind> {
        let kind = FileChangeKind::from_event(&event.kind)?;
        event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(self.file_name.as_os_str()))
            .then_some(kind)
    }
}
