//! Source information attached to tokens, nodes and diagnostics

use crate::types::{FileId, Location, Range};
use serde::{Deserialize, Serialize};

/// A located span of template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// The file the span belongs to
    pub file_id: FileId,
    /// The range in that file
    pub range: Range,
}

impl Default for SourceInfo {
    fn default() -> Self {
        SourceInfo::original(FileId(0), Range::default())
    }
}

impl SourceInfo {
    /// Create source info for a range in an original file
    pub fn original(file_id: FileId, range: Range) -> Self {
        SourceInfo { file_id, range }
    }

    /// Byte offset of the start of the span.
    pub fn start_offset(&self) -> usize {
        self.range.start.offset
    }

    /// Byte offset of the end of the span.
    pub fn end_offset(&self) -> usize {
        self.range.end.offset
    }

    /// The span covering both `self` and `other`.
    ///
    /// Spans from different files cannot be joined; `self` is returned as-is.
    pub fn to(&self, other: &SourceInfo) -> SourceInfo {
        if self.file_id != other.file_id {
            return *self;
        }
        SourceInfo {
            file_id: self.file_id,
            range: self.range.cover(&other.range),
        }
    }

    /// A zero-width span at the start of this one.
    pub fn start_point(&self) -> SourceInfo {
        SourceInfo {
            file_id: self.file_id,
            range: Range {
                start: self.range.start,
                end: self.range.start,
            },
        }
    }

    /// 1-indexed `row:column` label, used when no source context is available.
    pub fn label(&self) -> String {
        let Location { row, column, .. } = self.range.start;
        format!("{}:{}", row + 1, column + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_info::FileInformation;

    #[test]
    fn test_original_source_info() {
        let info = FileInformation::new("0123456789");
        let source_info = SourceInfo::original(FileId(3), info.range(2, 5));

        assert_eq!(source_info.file_id, FileId(3));
        assert_eq!(source_info.start_offset(), 2);
        assert_eq!(source_info.end_offset(), 5);
    }

    #[test]
    fn test_join_spans() {
        let info = FileInformation::new("0123456789");
        let a = SourceInfo::original(FileId(0), info.range(2, 4));
        let b = SourceInfo::original(FileId(0), info.range(6, 9));

        let joined = a.to(&b);
        assert_eq!(joined.start_offset(), 2);
        assert_eq!(joined.end_offset(), 9);
    }

    #[test]
    fn test_join_across_files_keeps_self() {
        let info = FileInformation::new("0123456789");
        let a = SourceInfo::original(FileId(0), info.range(2, 4));
        let b = SourceInfo::original(FileId(1), info.range(6, 9));
        assert_eq!(a.to(&b), a);
    }

    #[test]
    fn test_label_is_one_indexed() {
        let info = FileInformation::new("ab\ncdef");
        let source_info = SourceInfo::original(FileId(0), info.range(5, 6));
        assert_eq!(source_info.label(), "2:3");
    }

    #[test]
    fn test_serialization() {
        let info = FileInformation::new("hello");
        let source_info = SourceInfo::original(FileId(0), info.range(1, 3));
        let json = serde_json::to_value(source_info).unwrap();
        assert_eq!(json["range"]["start"]["offset"], 1);
        assert_eq!(json["range"]["end"]["column"], 3);
    }
}
