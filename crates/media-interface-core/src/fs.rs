//! File system abstraction for testability.
//!
//! Everything the core needs from the disk goes through the read-only
//! [`FileSystem`] trait, so classification, grouping and queries can run
//! against an in-memory card layout in tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use media_interface_core::fs::{FileSystem, RealFileSystem};
//!
//! let fs = RealFileSystem::new();
//! let walk = fs.walk_files(Path::new("/media/gopro/cards/001"))?;
//! for issue in &walk.issues {
//!     eprintln!("skipped {}: {}", issue.path.display(), issue.reason);
//! }
//! ```

use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::error::{Error, FileSystemError, Result};

/// Converts an I/O error for read operations.
fn read_error(path: &Path, e: &io::Error) -> Error {
    if e.kind() == io::ErrorKind::NotFound {
        return Error::FileSystem(FileSystemError::NotFound {
            path: path.to_path_buf(),
        });
    }
    Error::FileSystem(FileSystemError::ReadFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// A part of a directory tree that could not be read during a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanIssue {
    /// Path that could not be read.
    pub path: PathBuf,
    /// Why it could not be read.
    pub reason: String,
}

/// Files found by a recursive walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkOutcome {
    /// Regular files, sorted by path.
    pub files: Vec<PathBuf>,
    /// Subtrees that were skipped.
    pub issues: Vec<ScanIssue>,
}

/// Abstraction over read-only file system operations.
///
/// This trait allows components to be tested without touching the real file system.
#[cfg_attr(test, mockall::automock)]
pub trait FileSystem: Send + Sync {
    /// Read a file's contents as a string.
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// List entries in a directory.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Check if a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Check if a path is a file.
    fn is_file(&self, path: &Path) -> bool;

    /// Check if a path is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Get file metadata (size, modified time, etc.).
    fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Get the canonical, absolute form of a path.
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;

    /// Recursively list every regular file under `path`.
    ///
    /// Unreadable subdirectories are recorded in [`WalkOutcome::issues`] and
    /// skipped. Only an unreadable `path` itself is an error.
    fn walk_files(&self, path: &Path) -> Result<WalkOutcome>;
}

/// Simplified metadata structure for cross-platform compatibility.
#[derive(Debug, Clone)]
pub struct FileMetadata {
    /// File size in bytes.
    pub len: u64,
    /// Whether this is a directory.
    pub is_dir: bool,
    /// Whether this is a file.
    pub is_file: bool,
    /// Last modified time.
    pub modified: Option<SystemTime>,
}

impl FileMetadata {
    /// Create metadata from std::fs::Metadata.
    pub fn from_std(meta: &Metadata) -> Self {
        Self {
            len: meta.len(),
            is_dir: meta.is_dir(),
            is_file: meta.is_file(),
            modified: meta.modified().ok(),
        }
    }
}

/// Real file system implementation using std::fs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

impl RealFileSystem {
    /// Create a new real file system instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| read_error(path, &e))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(path).map_err(|e| read_error(path, &e))?;

        let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        paths.sort();
        Ok(paths)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let meta = fs::metadata(path).map_err(|e| read_error(path, &e))?;
        Ok(FileMetadata::from_std(&meta))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path).map_err(|e| read_error(path, &e))
    }

    fn walk_files(&self, path: &Path) -> Result<WalkOutcome> {
        // Fail early if the start directory itself is unreadable.
        fs::read_dir(path).map_err(|e| read_error(path, &e))?;

        let mut outcome = WalkOutcome::default();
        for entry in WalkDir::new(path).min_depth(1).follow_links(true) {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    outcome.files.push(entry.into_path());
                }
                Ok(_) => {}
                Err(e) => {
                    let failed = e.path().unwrap_or(path).to_path_buf();
                    outcome.issues.push(ScanIssue {
                        path: failed,
                        reason: e.to_string(),
                    });
                }
            }
        }
        outcome.files.sort();
        Ok(outcome)
    }
}
