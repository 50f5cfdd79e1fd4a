//! File source
//!
//! The store never touches the filesystem directly. It goes through a
//! [`FileSource`], which speaks in paths relative to the vault root.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::error::{Result, StoreError};

/// Files found under a directory, plus entries the walk could not read
#[derive(Debug, Default)]
pub struct Listing {
    pub files: Vec<PathBuf>,
    pub unreadable: Vec<(PathBuf, StoreError)>,
}

/// A hierarchical file tree the store reads from and writes to.
///
/// All paths are relative to the source's root.
pub trait FileSource: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// List files under `dir`, sorted by name. Directories themselves are
    /// not returned. Entries that cannot be read are handed back separately
    /// so the caller can report them.
    fn list_files(&self, dir: &Path, recursive: bool) -> Result<Listing>;

    fn read(&self, path: &Path) -> Result<String>;

    /// Create or replace `path` with `contents` in one step.
    fn upsert(&self, path: &Path, contents: &str) -> Result<()>;

    /// Move `from` to `to`. Fails if `to` already exists.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    fn remove(&self, path: &Path) -> Result<()>;
}

/// [`FileSource`] over a directory on the local filesystem
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the root path of the source
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn abs(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    /// Convert an absolute path under the root back to a relative one
    pub fn relativize(&self, path: &Path) -> Option<PathBuf> {
        path.strip_prefix(&self.root).ok().map(Path::to_path_buf)
    }
}

impl FileSource for FsSource {
    fn exists(&self, path: &Path) -> bool {
        self.abs(path).exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.abs(path).is_dir()
    }

    fn list_files(&self, dir: &Path, recursive: bool) -> Result<Listing> {
        let base = self.abs(dir);
        let walker = WalkDir::new(&base).min_depth(1).sort_by_file_name();
        let walker = if recursive { walker } else { walker.max_depth(1) };

        let mut listing = Listing::default();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .and_then(|p| self.relativize(p))
                        .unwrap_or_else(|| dir.to_path_buf());
                    listing.unreadable.push((path, StoreError::Walk(e)));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(relative) = self.relativize(entry.path()) {
                listing.files.push(relative);
            }
        }
        Ok(listing)
    }

    fn read(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(self.abs(path))?)
    }

    fn upsert(&self, path: &Path, contents: &str) -> Result<()> {
        let target = self.abs(path);
        let parent = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&parent)?;

        // Sibling temp file so the final rename stays on one filesystem
        let mut tmp = NamedTempFile::new_in(&parent)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let target = self.abs(to);
        if target.exists() {
            return Err(StoreError::PathOccupied(to.to_path_buf()));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(self.abs(from), target)?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        fs::remove_file(self.abs(path))?;
        Ok(())
    }
}
