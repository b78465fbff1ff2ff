// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Filesystem observation plumbing.
//!
//! `notify` runs its watcher on its own OS thread; events are normalized
//! and forwarded over a channel bridge into the async runtime, so the
//! watcher thread never blocks on long-running work. Debounce and the
//! actual event semantics live in `application::reconciler`.

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Modified/created file events are deferred this long after the last
/// write so partially-written files coalesce into one event.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("watch error: {0}")]
    Notify(#[from] notify::Error),

    #[error("watcher channel closed")]
    ChannelClosed,
}

/// Normalized filesystem event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    FileCreated(PathBuf),
    FileModified(PathBuf),
    FileDeleted(PathBuf),
    FileMoved { from: PathBuf, to: PathBuf },
    DirCreated(PathBuf),
    DirDeleted(PathBuf),
    DirMoved { from: PathBuf, to: PathBuf },
}

// ============================================================================
// Path filtering
// ============================================================================

/// The ignore rules for the watched tree. Directories are only filtered by
/// the operational-directory list; files additionally pass extension and
/// location gates.
#[derive(Debug, Clone, Default)]
pub struct PathFilter;

const IGNORED_DIR_SEGMENTS: &[&str] = &["logs", "processed", "node_modules", ".git", ".cursor"];

const DOCUMENT_EXTENSIONS: &[&str] = &[
    "md", "org", "txt", "pdf", "docx", "html", "htm", "epub", "csv", "json", "xml", "rtf", "odt",
];

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "svg", "ico", "tiff", "tif", "heic", "heif",
];

const WATCHED_EXTENSIONS: &[&str] = &[
    "md", "org", "txt", "pdf", "docx", "html", "htm", "epub", "jpg", "jpeg", "png", "gif", "bmp",
    "webp",
];

impl PathFilter {
    fn segments_lower(path: &Path) -> Vec<String> {
        path.components()
            .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
            .collect()
    }

    fn extension_lower(path: &Path) -> Option<String> {
        path.extension().map(|e| e.to_string_lossy().to_lowercase())
    }

    pub fn should_ignore(&self, path: &Path, is_directory: bool) -> bool {
        let segments = Self::segments_lower(path);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        // Operational directories never produce events, files or dirs.
        if segments
            .iter()
            .any(|s| IGNORED_DIR_SEGMENTS.contains(&s.as_str()))
        {
            return true;
        }

        // Hidden/backup markers.
        if name.starts_with(".~") || name.contains("~$") {
            return true;
        }

        if is_directory {
            // All other directories matter for the tree.
            return false;
        }

        let ext = Self::extension_lower(path).unwrap_or_default();
        if ext == "tmp" || ext == "swp" {
            return true;
        }

        // Messaging attachments are not documents.
        if segments.iter().any(|s| s == "messaging") {
            return true;
        }

        // Team posts: text/document files are processed, images and
        // everything else ignored.
        let in_team_posts = segments.iter().any(|s| s == "teams")
            && segments.iter().any(|s| s == "posts");
        if in_team_posts {
            if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
                return false;
            }
            if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                return true;
            }
            return true;
        }

        !WATCHED_EXTENSIONS.contains(&ext.as_str())
    }
}

// ============================================================================
// Debounce
// ============================================================================

/// Last-write timestamps per path. Writes within the window coalesce; a
/// once-per-second promotion tick drains paths past the horizon.
#[derive(Debug, Default)]
pub struct DebounceQueue {
    pending: HashMap<PathBuf, Instant>,
}

impl DebounceQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch(&mut self, path: PathBuf) {
        self.pending.insert(path, Instant::now());
    }

    pub fn remove(&mut self, path: &Path) {
        self.pending.remove(path);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Paths whose last write is older than the window.
    pub fn drain_ready(&mut self, window: Duration) -> Vec<PathBuf> {
        let now = Instant::now();
        let ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, at)| now.duration_since(**at) >= window)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &ready {
            self.pending.remove(path);
        }
        ready
    }
}

// ============================================================================
// The notify bridge
// ============================================================================

pub struct FsWatcher {
    // Kept alive for the lifetime of the watch; dropping stops the thread.
    _watcher: RecommendedWatcher,
}

impl FsWatcher {
    /// Start watching `root` recursively. Returns the handle and the
    /// normalized event stream. The notify callback runs on the watcher's
    /// own thread and only does a non-blocking channel send.
    pub fn start(
        root: &Path,
        filter: PathFilter,
    ) -> Result<(Self, mpsc::UnboundedReceiver<WatchEvent>), WatcherError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |result: Result<Event, notify::Error>| {
            match result {
                Ok(event) => {
                    for normalized in normalize_event(&event, &filter) {
                        if tx.send(normalized).is_err() {
                            debug!("watch event receiver dropped");
                        }
                    }
                }
                Err(e) => error!(error = %e, "filesystem watch error"),
            }
        })?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        info!(root = %root.display(), "filesystem watcher started");

        Ok((Self { _watcher: watcher }, rx))
    }
}

fn normalize_event(event: &Event, filter: &PathFilter) -> Vec<WatchEvent> {
    let mut out = Vec::new();
    match &event.kind {
        EventKind::Create(kind) => {
            for path in &event.paths {
                let is_dir = matches!(kind, CreateKind::Folder) || path.is_dir();
                if filter.should_ignore(path, is_dir) {
                    continue;
                }
                out.push(if is_dir {
                    WatchEvent::DirCreated(path.clone())
                } else {
                    WatchEvent::FileCreated(path.clone())
                });
            }
        }
        EventKind::Modify(ModifyKind::Name(mode)) => {
            if matches!(mode, RenameMode::Both) && event.paths.len() == 2 {
                let from = event.paths[0].clone();
                let to = event.paths[1].clone();
                let is_dir = to.is_dir();
                if !filter.should_ignore(&to, is_dir) {
                    out.push(if is_dir {
                        WatchEvent::DirMoved { from, to }
                    } else {
                        WatchEvent::FileMoved { from, to }
                    });
                }
            } else {
                // One-sided rename: treat the disappearing side as delete,
                // the appearing side as create.
                for path in &event.paths {
                    if path.exists() {
                        let is_dir = path.is_dir();
                        if filter.should_ignore(path, is_dir) {
                            continue;
                        }
                        out.push(if is_dir {
                            WatchEvent::DirCreated(path.clone())
                        } else {
                            WatchEvent::FileCreated(path.clone())
                        });
                    } else if !filter.should_ignore(path, false) {
                        out.push(WatchEvent::FileDeleted(path.clone()));
                    }
                }
            }
        }
        EventKind::Modify(_) => {
            for path in &event.paths {
                if path.is_dir() || filter.should_ignore(path, path.is_dir()) {
                    continue;
                }
                out.push(WatchEvent::FileModified(path.clone()));
            }
        }
        EventKind::Remove(kind) => {
            for path in &event.paths {
                let is_dir = matches!(kind, RemoveKind::Folder);
                if filter.should_ignore(path, is_dir) {
                    continue;
                }
                out.push(if is_dir {
                    WatchEvent::DirDeleted(path.clone())
                } else {
                    WatchEvent::FileDeleted(path.clone())
                });
            }
        }
        _ => {}
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operational_dirs_are_ignored() {
        let filter = PathFilter;
        assert!(filter.should_ignore(Path::new("/uploads/logs/app.log"), false));
        assert!(filter.should_ignore(Path::new("/uploads/node_modules/x.md"), false));
        assert!(filter.should_ignore(Path::new("/uploads/.git/config"), false));
        assert!(filter.should_ignore(Path::new("/uploads/.cursor/state.md"), true));
        assert!(filter.should_ignore(Path::new("/uploads/processed/a.pdf"), false));
    }

    #[test]
    fn messaging_subtree_is_ignored_entirely() {
        let filter = PathFilter;
        assert!(filter.should_ignore(Path::new("/uploads/messaging/room1/file.md"), false));
    }

    #[test]
    fn team_posts_allow_documents_but_not_images() {
        let filter = PathFilter;
        assert!(!filter.should_ignore(Path::new("/uploads/Teams/t1/posts/notes.md"), false));
        assert!(!filter.should_ignore(Path::new("/uploads/Teams/t1/posts/report.pdf"), false));
        assert!(filter.should_ignore(Path::new("/uploads/Teams/t1/posts/photo.png"), false));
        assert!(filter.should_ignore(Path::new("/uploads/Teams/t1/posts/archive.zip"), false));
    }

    #[test]
    fn directories_are_only_filtered_by_operational_list() {
        let filter = PathFilter;
        assert!(!filter.should_ignore(Path::new("/uploads/Users/alice/NewFolder"), true));
        assert!(!filter.should_ignore(Path::new("/uploads/Global/Research"), true));
    }

    #[test]
    fn temp_and_unknown_extensions_are_ignored() {
        let filter = PathFilter;
        assert!(filter.should_ignore(Path::new("/uploads/Users/a/file.tmp"), false));
        assert!(filter.should_ignore(Path::new("/uploads/Users/a/file.swp"), false));
        assert!(filter.should_ignore(Path::new("/uploads/Users/a/~$doc.docx"), false));
        assert!(filter.should_ignore(Path::new("/uploads/Users/a/binary.exe"), false));
        assert!(!filter.should_ignore(Path::new("/uploads/Users/a/notes.md"), false));
    }

    #[test]
    fn debounce_coalesces_until_window_elapses() {
        let mut queue = DebounceQueue::new();
        queue.touch(PathBuf::from("/a.md"));
        queue.touch(PathBuf::from("/a.md"));
        queue.touch(PathBuf::from("/b.md"));
        assert_eq!(queue.len(), 2);

        // Nothing is ready inside the window.
        assert!(queue.drain_ready(Duration::from_secs(2)).is_empty());
        assert_eq!(queue.len(), 2);

        // Everything is ready once the window is zero.
        let ready = queue.drain_ready(Duration::ZERO);
        assert_eq!(ready.len(), 2);
        assert!(queue.is_empty());
    }
}
