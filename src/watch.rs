//! Filesystem watching
//!
//! Turns raw `notify` events into `(path, action)` changes the store
//! understands. The watcher only produces changes; applying them is left to
//! whoever owns the store, which keeps cache mutation on one thread.

use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::{self, Receiver};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::source::FileSource;
use crate::store::{ChangeAction, LoadFailure, RecordStore};

/// A change to one path, relative to the vault root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: PathBuf,
    pub action: ChangeAction,
}

impl FileChange {
    pub fn new(path: impl Into<PathBuf>, action: ChangeAction) -> Self {
        Self {
            path: path.into(),
            action,
        }
    }

    /// Downgrade to a delete when the path is already gone.
    ///
    /// Events arrive after the fact; a create or rename for a file that has
    /// since disappeared is best treated as its removal.
    pub fn settle(self, source: &dyn FileSource) -> Self {
        if self.action != ChangeAction::Delete && !source.exists(&self.path) {
            return Self::new(self.path, ChangeAction::Delete);
        }
        self
    }
}

/// Watcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchOptions {
    /// Watch subdirectories too
    #[serde(default = "default_true")]
    pub recursive: bool,
    /// Drop events for dot-files and anything under a dot-directory
    #[serde(default = "default_true")]
    pub ignore_hidden: bool,
}

fn default_true() -> bool {
    true
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            ignore_hidden: true,
        }
    }
}

/// Map one `notify` event to store changes, relative to `root`.
///
/// A rename that reports both ends becomes a delete of the old path and a
/// rename of the new one. Access and metadata-only events are dropped, as
/// are paths outside `root`.
pub fn translate(event: &Event, root: &Path) -> Vec<FileChange> {
    let relative = |p: &PathBuf| p.strip_prefix(root).ok().map(Path::to_path_buf);
    let each = |action: ChangeAction| -> Vec<FileChange> {
        event
            .paths
            .iter()
            .filter_map(relative)
            .map(|p| FileChange::new(p, action))
            .collect()
    };

    match &event.kind {
        EventKind::Create(_) => each(ChangeAction::Create),
        EventKind::Remove(_) => each(ChangeAction::Delete),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut changes = Vec::new();
            if let Some(from) = event.paths.first().and_then(relative) {
                changes.push(FileChange::new(from, ChangeAction::Delete));
            }
            if let Some(to) = event.paths.get(1).and_then(relative) {
                changes.push(FileChange::new(to, ChangeAction::Rename));
            }
            changes
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(ChangeAction::Delete),
        EventKind::Modify(ModifyKind::Name(_)) => each(ChangeAction::Rename),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => each(ChangeAction::Modify),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

fn is_hidden(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

/// Live `notify` watcher over a vault directory
pub struct VaultWatcher {
    root: PathBuf,
    options: WatchOptions,
    rx: Receiver<notify::Result<Event>>,
    // Dropping the watcher stops event delivery
    _watcher: RecommendedWatcher,
}

impl VaultWatcher {
    /// Start watching `root`
    pub fn start(root: &Path, options: WatchOptions) -> Result<Self> {
        // Backends report canonical paths
        let root = root.canonicalize()?;
        let (tx, rx) = mpsc::channel();

        let mut watcher = notify::recommended_watcher(tx)?;
        let mode = if options.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(&root, mode)?;
        debug!("Watching {}", root.display());

        Ok(Self {
            root,
            options,
            rx,
            _watcher: watcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Block for the next batch of changes.
    ///
    /// Returns `None` once the watcher has shut down. Backend errors are
    /// logged and yield an empty batch.
    pub fn recv(&self) -> Option<Vec<FileChange>> {
        let event = self.rx.recv().ok()?;
        Some(self.changes_for(event))
    }

    fn changes_for(&self, event: notify::Result<Event>) -> Vec<FileChange> {
        match event {
            Ok(event) => translate(&event, &self.root)
                .into_iter()
                .filter(|c| !(self.options.ignore_hidden && is_hidden(&c.path)))
                .collect(),
            Err(e) => {
                warn!("Watch error: {}", e);
                Vec::new()
            }
        }
    }
}

/// Apply a batch of changes to the store, in order
pub fn apply(store: &mut RecordStore, changes: Vec<FileChange>) -> Vec<LoadFailure> {
    let mut failures = Vec::new();
    for change in changes {
        let change = change.settle(store.source());
        failures.extend(store.on_file_changed(&change.path, change.action));
    }
    failures
}
