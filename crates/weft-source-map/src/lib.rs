//! Source locations for weft templates
//!
//! Every token produced by the tokenizer, every AST node and every diagnostic
//! carries a [`SourceInfo`]: the file it came from and the byte range it
//! covers, with row/column positions resolved up front.
//!
//! # Overview
//!
//! - [`SourceInfo`]: a file id plus a [`Range`]
//! - [`FileInformation`]: line-break index for offset → row/column lookups
//! - [`SourceContext`]: registry of files, used when rendering diagnostics
//!
//! # Example
//!
//! ```rust
//! use weft_source_map::*;
//!
//! let mut ctx = SourceContext::new();
//! let file_id = ctx.add_file("page.weft".into(), Some("Hello\n$(name)".into()));
//!
//! let info = FileInformation::new("Hello\n$(name)");
//! let source_info = SourceInfo::original(file_id, info.range(6, 13));
//!
//! assert_eq!(source_info.range.start.row, 1);
//! assert_eq!(source_info.range.start.column, 0);
//! ```

pub mod context;
pub mod file_info;
pub mod source_info;
pub mod types;

// Re-export main types
pub use context::{SourceContext, SourceFile};
pub use file_info::FileInformation;
pub use source_info::SourceInfo;
pub use types::{FileId, Location, Range};
