//! Builder API for diagnostic messages.

use crate::diagnostic::{DetailItem, DetailKind, DiagnosticKind, DiagnosticMessage, MessageContent};
use weft_source_map::SourceInfo;

/// Builder for [`DiagnosticMessage`].
///
/// # Example
///
/// ```
/// use weft_error_reporting::DiagnosticMessageBuilder;
///
/// let error = DiagnosticMessageBuilder::error("Not enumerable")
///     .with_code("TM003")
///     .problem("`#foreach` needs a list, dictionary or string")
///     .add_detail("`count` is an Int32")
///     .add_hint("Did you mean `#loop`?")
///     .build();
/// assert_eq!(error.details.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct DiagnosticMessageBuilder {
    message: DiagnosticMessage,
}

impl DiagnosticMessageBuilder {
    fn new(kind: DiagnosticKind, title: impl Into<String>) -> Self {
        Self {
            message: DiagnosticMessage::new(kind, title),
        }
    }

    /// Start an error diagnostic.
    pub fn error(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Error, title)
    }

    /// Start a warning diagnostic.
    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Warning, title)
    }

    /// Start an info diagnostic.
    pub fn info(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Info, title)
    }

    /// Start a diagnostic whose kind is decided by the caller.
    pub fn with_kind(kind: DiagnosticKind, title: impl Into<String>) -> Self {
        Self::new(kind, title)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.message.code = Some(code.into());
        self
    }

    pub fn problem(mut self, problem: impl Into<MessageContent>) -> Self {
        self.message.problem = Some(problem.into());
        self
    }

    fn push_detail(mut self, kind: DetailKind, content: impl Into<MessageContent>) -> Self {
        self.message.details.push(DetailItem {
            kind,
            content: content.into(),
            location: None,
        });
        self
    }

    /// Add an error detail (✖ bullet).
    pub fn add_detail(self, detail: impl Into<MessageContent>) -> Self {
        self.push_detail(DetailKind::Error, detail)
    }

    /// Add an info detail (ℹ bullet).
    pub fn add_info(self, info: impl Into<MessageContent>) -> Self {
        self.push_detail(DetailKind::Info, info)
    }

    /// Add a note detail (• bullet).
    pub fn add_note(self, note: impl Into<MessageContent>) -> Self {
        self.push_detail(DetailKind::Note, note)
    }

    /// Add an error detail pointing at a second source location.
    pub fn add_detail_at(mut self, detail: impl Into<MessageContent>, location: SourceInfo) -> Self {
        self.message.details.push(DetailItem {
            kind: DetailKind::Error,
            content: detail.into(),
            location: Some(location),
        });
        self
    }

    pub fn add_hint(mut self, hint: impl Into<MessageContent>) -> Self {
        self.message.hints.push(hint.into());
        self
    }

    pub fn with_location(mut self, location: SourceInfo) -> Self {
        self.message.location = Some(location);
        self
    }

    pub fn build(self) -> DiagnosticMessage {
        self.message
    }
}
