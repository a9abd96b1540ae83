use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use sedge_common::{Result, error::Error};

/// Allocator of scratch file paths backed by a temporary directory.
///
/// Paths produced by [`allocate_path`](SpillStore::allocate_path) are unique
/// for the lifetime of the store: a monotonic sequence number distinguishes
/// allocations within one store, and a random component distinguishes stores
/// that happen to share a parent directory.
///
/// The store never opens the files itself; consumers create, write, and
/// delete them. Whatever remains in the directory is removed on drop.
#[derive(Debug)]
pub struct SpillStore {
    dir: tempfile::TempDir,
    next_seq: AtomicU64,
    token: u64,
}

impl SpillStore {
    /// Creates a spill store in the system temporary directory.
    pub fn new() -> Result<SpillStore> {
        let dir = tempfile::tempdir().map_err(|e| Error::io("spill store", e))?;
        Ok(Self::from_dir(dir))
    }

    /// Creates a spill store under the given parent directory, typically on
    /// the same filesystem as the final index destination so the finished
    /// chunk can be renamed rather than copied.
    pub fn in_dir(parent: impl AsRef<Path>) -> Result<SpillStore> {
        let parent = parent.as_ref();
        let dir = tempfile::tempdir_in(parent)
            .map_err(|e| Error::io(parent.display().to_string(), e))?;
        Ok(Self::from_dir(dir))
    }

    fn from_dir(dir: tempfile::TempDir) -> SpillStore {
        SpillStore {
            dir,
            next_seq: AtomicU64::new(0),
            token: fastrand::u64(..),
        }
    }

    /// Path of the scratch directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Produces a fresh, unique file path inside the scratch directory.
    /// The file is not created; `label` makes the scratch directory
    /// readable when inspecting a failed build.
    pub fn allocate_path(&self, label: &str) -> PathBuf {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.dir
            .path()
            .join(format!("{label}-{:08x}-{seq}.chunk", self.token))
    }

    /// Disables cleanup and returns the scratch directory path, leaving all
    /// remaining files in place. Used to hand off the finished index file.
    pub fn keep(self) -> PathBuf {
        self.dir.keep()
    }
}
