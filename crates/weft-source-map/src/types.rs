//! Core types for source locations

use serde::{Deserialize, Serialize};

/// A unique identifier for a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub usize);

/// A location in source text (0-indexed)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Location {
    /// Byte offset from start of source
    pub offset: usize,
    /// Row number (0-indexed)
    pub row: usize,
    /// Column number (0-indexed, in bytes from the start of the row)
    pub column: usize,
}

/// A range in source text from start to end
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    /// Start location (inclusive)
    pub start: Location,
    /// End location (exclusive)
    pub end: Location,
}

impl Range {
    /// Length of the range in bytes.
    pub fn len(&self) -> usize {
        self.end.offset.saturating_sub(self.start.offset)
    }

    /// True when the range covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The smallest range covering both `self` and `other`.
    pub fn cover(&self, other: &Range) -> Range {
        Range {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(offset: usize, row: usize, column: usize) -> Location {
        Location {
            offset,
            row,
            column,
        }
    }

    #[test]
    fn test_file_id_equality() {
        assert_eq!(FileId(0), FileId(0));
        assert_ne!(FileId(0), FileId(1));
    }

    #[test]
    fn test_location_ordering() {
        let loc1 = loc(0, 0, 0);
        let loc2 = loc(5, 0, 5);
        let loc3 = loc(10, 1, 0);

        assert!(loc1 < loc2);
        assert!(loc2 < loc3);
        assert!(loc1 < loc3);
    }

    #[test]
    fn test_range_len() {
        let range = Range {
            start: loc(3, 0, 3),
            end: loc(8, 0, 8),
        };
        assert_eq!(range.len(), 5);
        assert!(!range.is_empty());
        assert!(Range::default().is_empty());
    }

    #[test]
    fn test_range_cover() {
        let a = Range {
            start: loc(3, 0, 3),
            end: loc(8, 0, 8),
        };
        let b = Range {
            start: loc(6, 0, 6),
            end: loc(14, 1, 2),
        };

        let covered = a.cover(&b);
        assert_eq!(covered.start, loc(3, 0, 3));
        assert_eq!(covered.end, loc(14, 1, 2));
    }
}
