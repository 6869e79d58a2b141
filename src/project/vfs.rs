//! File system access behind a trait, so documents can be loaded from disk or
//! from memory.

use std::io;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

pub trait FileSystem: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<String>;
    fn write(&self, path: &Path, text: &str) -> io::Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// The real file system
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, text: &str) -> io::Result<()> {
        std::fs::write(path, text)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }
}

/// In-memory files; reads of selected paths can be made to fail.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: RwLock<FxHashMap<PathBuf, String>>,
    failing: RwLock<FxHashSet<PathBuf>>,
    reads: RwLock<FxHashMap<PathBuf, usize>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.files.write().insert(path.into(), text.into());
    }

    pub fn remove(&self, path: &Path) -> Option<String> {
        self.files.write().remove(path)
    }

    pub fn contents(&self, path: &Path) -> Option<String> {
        self.files.read().get(path).cloned()
    }

    /// Make every read of `path` fail until [`Self::clear_failure`].
    pub fn fail_reads(&self, path: impl Into<PathBuf>) {
        self.failing.write().insert(path.into());
    }

    pub fn clear_failure(&self, path: &Path) {
        self.failing.write().remove(path);
    }

    /// How many times `path` was read, failed reads included.
    pub fn read_count(&self, path: &Path) -> usize {
        self.reads.read().get(path).copied().unwrap_or(0)
    }
}

impl FileSystem for MemoryFileSystem {
    fn read(&self, path: &Path) -> io::Result<String> {
        *self.reads.write().entry(path.to_path_buf()).or_default() += 1;
        if self.failing.read().contains(path) {
            return Err(io::Error::other(format!(
                "injected read failure for {}",
                path.display()
            )));
        }
        self.files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn write(&self, path: &Path, text: &str) -> io::Result<()> {
        self.insert(path, text);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut files = self.files.write();
        let text = files
            .remove(from)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, from.display().to_string()))?;
        files.insert(to.to_path_buf(), text);
        Ok(())
    }
}
