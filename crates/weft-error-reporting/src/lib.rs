//! Error reporting and diagnostic messages for weft.
//!
//! Evaluation of a template never aborts with a Rust error: every problem is
//! recorded as a [`DiagnosticMessage`] carrying a stable error code (`E101`,
//! `TM001`, ...), a severity, a title, optional details and a source location.
//! Hosts filter on the code strings, which are registered in the
//! [`ERROR_CATALOG`].
//!
//! # Rendering
//!
//! - [`DiagnosticMessage::to_text`] produces a tidy, bullet-style message and,
//!   when a [`weft_source_map::SourceContext`] is supplied, an ariadne source
//!   snippet.
//! - [`DiagnosticMessage::to_json`] produces a machine-readable object.
//!
//! # Example
//!
//! ```
//! use weft_error_reporting::{DiagnosticKind, DiagnosticMessageBuilder};
//!
//! let warning = DiagnosticMessageBuilder::warning("Key not found")
//!     .with_code("E101")
//!     .add_detail("`user` is not defined in the state table")
//!     .build();
//!
//! assert_eq!(warning.kind, DiagnosticKind::Warning);
//! assert!(warning.to_text(None).contains("[E101]"));
//! ```

pub mod builder;
pub mod catalog;
pub mod diagnostic;

// Re-export main types for convenience
pub use builder::DiagnosticMessageBuilder;
pub use catalog::{ERROR_CATALOG, ErrorCodeInfo, default_kind, get_error_info, get_subsystem};
pub use diagnostic::{DetailItem, DetailKind, DiagnosticKind, DiagnosticMessage, MessageContent};
