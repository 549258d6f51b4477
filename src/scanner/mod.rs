//! Scanner module for candidate discovery and file content access.
//!
//! This module provides functionality for:
//! - Directory walking and manifest reading ([`walker`])
//! - Streaming content hashing with BLAKE3 and SHA-256 ([`hasher`])
//! - The predicate gate applied to every candidate ([`predicate`])
//!
//! # Example
//!
//! ```no_run
//! use chaindupe::scanner::{PredicateGate, Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig::default().with_file_include(vec!["*.jpg".to_string()]);
//! let gate = PredicateGate::default();
//!
//! let walker = Walker::new(Path::new("~/Pictures"), config);
//! for candidate in walker.walk().expect("invalid root") {
//!     match candidate {
//!         Ok(path) if gate.admits(&path) => println!("{}", path.display()),
//!         Ok(_) => {}
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod predicate;
pub mod walker;

use std::path::PathBuf;

// Re-export main types
pub use hasher::{hash_to_hex, Hash, Hasher, CHUNK_SIZE, DEFAULT_PARTIAL_CHUNKS};
pub use predicate::{Predicate, PredicateGate};
pub use walker::{walk_roots, Candidates, Walker};

/// Configuration for candidate discovery.
///
/// Controls recursion, hidden directory pruning and the file/directory
/// include and exclude rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkerConfig {
    /// Descend into subdirectories. When false only the root's own files are yielded.
    pub recursive: bool,

    /// Maximum number of directory levels to yield files from (root = 1).
    /// `None` or `Some(0)` means unlimited.
    pub max_depth: Option<usize>,

    /// Walk into hidden directories (any path segment starting with `.`).
    pub include_hidden: bool,

    /// Basename globs; a file matching any of them is always yielded.
    pub file_include: Vec<String>,

    /// Basename globs; files not already included are yielded unless they match one.
    pub file_exclude: Vec<String>,

    /// Substrings that must all appear in a directory path for its files to be yielded.
    pub dir_include: Vec<String>,

    /// Substrings that, when all present in a directory path, reject its files.
    pub dir_exclude: Vec<String>,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            max_depth: None,
            include_hidden: false,
            file_include: Vec::new(),
            file_exclude: Vec::new(),
            dir_include: Vec::new(),
            dir_exclude: Vec::new(),
        }
    }
}

impl WalkerConfig {
    /// Enable or disable recursion.
    #[must_use]
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Limit the number of directory levels.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Walk into hidden directories.
    #[must_use]
    pub fn with_include_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    /// Set the basename include globs.
    #[must_use]
    pub fn with_file_include(mut self, globs: Vec<String>) -> Self {
        self.file_include = globs;
        self
    }

    /// Set the basename exclude globs.
    #[must_use]
    pub fn with_file_exclude(mut self, globs: Vec<String>) -> Self {
        self.file_exclude = globs;
        self
    }

    /// Set the directory include substrings.
    #[must_use]
    pub fn with_dir_include(mut self, substrings: Vec<String>) -> Self {
        self.dir_include = substrings;
        self
    }

    /// Set the directory exclude substrings.
    #[must_use]
    pub fn with_dir_exclude(mut self, substrings: Vec<String>) -> Self {
        self.dir_exclude = substrings;
        self
    }

    /// Depth limit handed to the traversal, combining `recursive` and `max_depth`.
    #[must_use]
    pub fn effective_max_depth(&self) -> Option<usize> {
        if !self.recursive {
            return Some(1);
        }
        self.max_depth.filter(|&depth| depth > 0)
    }
}

/// Recoverable errors met while producing candidates.
///
/// These are logged and counted; the walk carries on.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when reading a directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// A manifest line named a path that does not exist.
    #[error("File '{0}' not found, skipping")]
    NotFound(PathBuf),

    /// An I/O error occurred while reading a directory or manifest line.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Fatal errors that prevent a root from being walked at all.
#[derive(thiserror::Error, Debug)]
pub enum WalkError {
    /// The root does not exist.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The manifest could not be opened or read.
    #[error("Cannot read manifest {path}: {source}")]
    Unreadable {
        /// Manifest path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The manifest has no lines at all.
    #[error("'{0}' is not a valid input: manifest is empty")]
    EmptyManifest(PathBuf),

    /// The manifest's first line is not valid UTF-8.
    #[error("'{0}' is not a valid input: first line is not valid text")]
    Undecodable(PathBuf),

    /// The manifest's first line does not name an existing path.
    #[error("'{manifest}' is not a valid input: each line must be a filename, '{line}' does not exist")]
    InvalidFirstLine {
        /// Manifest path
        manifest: PathBuf,
        /// The offending first line
        line: String,
    },

    /// An include or exclude glob could not be compiled.
    #[error("Invalid glob pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The pattern as given
        pattern: String,
        /// Compilation error
        #[source]
        source: globset::Error,
    },
}

/// Errors that can occur while computing a signature.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Reading stopped because shutdown was requested.
    #[error("Interrupted while reading {0}")]
    Interrupted(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Classify an I/O error raised for `path`.
    #[must_use]
    pub fn from_io(path: &std::path::Path, error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
