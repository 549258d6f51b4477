//! Plain text reporter.
//!
//! Each group is written as its member paths, one per line, followed by a
//! blank line. With labels enabled, a header line such as
//! `f1=1024 f2=3a7bd3e2...` precedes the paths.

use std::io::Write;

use yansi::Paint;

use super::{GroupReporter, OutputError};
use crate::duplicates::Group;

/// Writes groups as plain text.
#[derive(Debug)]
pub struct TextReporter<W: Write> {
    writer: W,
    labels: bool,
    color: bool,
}

impl<W: Write> TextReporter<W> {
    /// Create a reporter without labels or color.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            labels: false,
            color: false,
        }
    }

    /// Print the provenance header before each group.
    #[must_use]
    pub fn with_labels(mut self, labels: bool) -> Self {
        self.labels = labels;
        self
    }

    /// Color the provenance header.
    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_header(&mut self, group: &Group) -> Result<(), OutputError> {
        if !self.color {
            writeln!(self.writer, "{}", group.provenance())?;
            return Ok(());
        }

        for (i, (label, signature)) in group.provenance().labeled().enumerate() {
            if i > 0 {
                write!(self.writer, " ")?;
            }
            write!(self.writer, "{}={}", label.cyan().bold(), signature.dim())?;
        }
        writeln!(self.writer)?;
        Ok(())
    }
}

impl<W: Write> GroupReporter for TextReporter<W> {
    fn report(&mut self, group: &Group) -> Result<(), OutputError> {
        if self.labels {
            self.write_header(group)?;
        }
        for path in group.members() {
            writeln!(self.writer, "{}", path.display())?;
        }
        writeln!(self.writer)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}
