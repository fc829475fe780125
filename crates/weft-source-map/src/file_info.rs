//! Efficient file information for location lookups

use crate::types::{Location, Range};
use serde::{Deserialize, Serialize};

/// Efficient file content analysis for location lookups
///
/// This struct stores metadata about a file that enables fast conversion
/// from byte offsets to (row, column) positions without storing the full
/// file content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInformation {
    /// Byte offsets of each newline character in the file
    line_breaks: Vec<usize>,

    /// Total length of the file in bytes
    total_length: usize,
}

impl FileInformation {
    /// Create file information by analyzing content
    ///
    /// Scans the content once to build an index of line break positions.
    /// This enables O(log n) offset-to-location lookups via binary search.
    ///
    /// # Example
    ///
    /// ```
    /// use weft_source_map::FileInformation;
    ///
    /// let info = FileInformation::new("line 1\nline 2\nline 3");
    /// assert_eq!(info.line_count(), 3);
    /// ```
    pub fn new(content: &str) -> Self {
        let line_breaks: Vec<usize> = content
            .bytes()
            .enumerate()
            .filter_map(|(idx, b)| (b == b'\n').then_some(idx))
            .collect();

        FileInformation {
            line_breaks,
            total_length: content.len(),
        }
    }

    /// Convert a byte offset to a Location with row and column
    ///
    /// Returns None if the offset is out of bounds.
    ///
    /// # Example
    ///
    /// ```
    /// use weft_source_map::FileInformation;
    ///
    /// let info = FileInformation::new("hello\nworld");
    /// let loc = info.offset_to_location(6).unwrap();
    /// assert_eq!(loc.row, 1);
    /// assert_eq!(loc.column, 0);
    /// ```
    pub fn offset_to_location(&self, offset: usize) -> Option<Location> {
        if offset > self.total_length {
            return None;
        }

        // A newline belongs to the line it terminates, so an exact hit and an
        // insertion point both name the same row.
        let row = match self.line_breaks.binary_search(&offset) {
            Ok(idx) | Err(idx) => idx,
        };

        let line_start = if row == 0 {
            0
        } else {
            self.line_breaks[row - 1] + 1
        };

        Some(Location {
            offset,
            row,
            column: offset - line_start,
        })
    }

    /// Build a [`Range`] from byte offsets, clamping out-of-bounds offsets to
    /// the end of the file.
    pub fn range(&self, start: usize, end: usize) -> Range {
        let clamp = |offset: usize| {
            self.offset_to_location(offset.min(self.total_length))
                .unwrap_or_default()
        };
        Range {
            start: clamp(start),
            end: clamp(end.max(start)),
        }
    }

    /// Get the total length of the file in bytes
    pub fn total_length(&self) -> usize {
        self.total_length
    }

    /// Get the number of lines in the file
    pub fn line_count(&self) -> usize {
        self.line_breaks.len() + 1
    }
}
