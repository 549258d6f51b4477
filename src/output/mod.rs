//! Reporters for finished duplicate groups.
//!
//! This module provides the output formats for groups as they are finalized:
//! - Plain text, one path per line with a blank line between groups ([`text`])
//! - JSON lines for automation and scripting ([`json`])
//!
//! # Example
//!
//! ```no_run
//! use chaindupe::duplicates::DuplicateFinder;
//! use chaindupe::output::{GroupReporter, TextReporter};
//! use std::path::PathBuf;
//!
//! let finder = DuplicateFinder::with_defaults();
//! let mut stream = finder.stream(&[PathBuf::from(".")]).unwrap();
//! let mut reporter = TextReporter::new(std::io::stdout().lock());
//!
//! for group in stream.by_ref() {
//!     reporter.report(&group).unwrap();
//! }
//! reporter.finish().unwrap();
//! ```

pub mod json;
pub mod text;

use crate::duplicates::Group;

// Re-export main types
pub use json::JsonReporter;
pub use text::TextReporter;

/// A sink for finished groups.
pub trait GroupReporter {
    /// Write one group.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError`] if the group cannot be written.
    fn report(&mut self, group: &Group) -> Result<(), OutputError>;

    /// Flush any buffered output after the last group.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError`] if flushing fails.
    fn finish(&mut self) -> Result<(), OutputError>;
}

/// Errors that can occur while writing groups.
#[derive(thiserror::Error, Debug)]
pub enum OutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error while writing output: {0}")]
    Io(#[from] std::io::Error),
}

impl OutputError {
    /// True when the reader went away (for example `chaindupe scan . | head`).
    #[must_use]
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::BrokenPipe)
    }
}
