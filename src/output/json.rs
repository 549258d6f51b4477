//! JSON lines reporter.
//!
//! Provides machine-readable output for scripting and automation: one compact
//! JSON object per group, written as soon as the group is final.
//!
//! # Output Schema
//!
//! ```json
//! {"files":["/path/a.txt","/path/b.txt"],"provenance":{"f1":1024,"f2":"3a7bd3e2..."}}
//! ```
//!
//! `size` signatures are numbers; every other signature is a string.

use std::io::Write;

use super::{GroupReporter, OutputError};
use crate::duplicates::Group;

/// Writes one JSON object per group.
#[derive(Debug)]
pub struct JsonReporter<W: Write> {
    writer: W,
    pretty: bool,
}

impl<W: Write> JsonReporter<W> {
    /// Create a compact JSON lines reporter.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            pretty: false,
        }
    }

    /// Pretty-print each object (no longer one object per line).
    #[must_use]
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> GroupReporter for JsonReporter<W> {
    fn report(&mut self, group: &Group) -> Result<(), OutputError> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, group)?;
        } else {
            serde_json::to_writer(&mut self.writer, group)?;
        }
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}
