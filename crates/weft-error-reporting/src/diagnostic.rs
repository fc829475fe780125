//! Core diagnostic message types.
//!
//! A [`DiagnosticMessage`] is what the evaluator appends to its error list.
//! It is structured tidyverse-style: a code and title, an optional problem
//! statement, bulleted details and hints.

use serde::{Deserialize, Serialize};
use std::fmt::Write;
use weft_source_map::{SourceContext, SourceInfo};

/// The kind of diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// An error that prevents completion
    Error,
    /// A warning that doesn't prevent completion but indicates a problem
    Warning,
    /// Informational message
    Info,
    /// A note providing additional context
    Note,
}

impl DiagnosticKind {
    fn label(self) -> &'static str {
        match self {
            DiagnosticKind::Error => "Error",
            DiagnosticKind::Warning => "Warning",
            DiagnosticKind::Info => "Info",
            DiagnosticKind::Note => "Note",
        }
    }
}

/// How detail items should be presented (x/i bullet style).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailKind {
    /// Error detail (✖ bullet)
    Error,
    /// Info detail (ℹ bullet)
    Info,
    /// Note detail (plain bullet)
    Note,
}

impl DetailKind {
    fn bullet(self) -> &'static str {
        match self {
            DetailKind::Error => "✖",
            DetailKind::Info => "ℹ",
            DetailKind::Note => "•",
        }
    }
}

/// The content of a message or detail item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageContent {
    /// Plain text content
    Plain(String),
    /// Markdown content, rendered verbatim in text output
    Markdown(String),
}

impl MessageContent {
    /// Get the raw string content for display
    pub fn as_str(&self) -> &str {
        match self {
            MessageContent::Plain(s) | MessageContent::Markdown(s) => s,
        }
    }

    /// Convert to JSON value with type information
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            MessageContent::Plain(s) => json!({ "type": "plain", "content": s }),
            MessageContent::Markdown(s) => json!({ "type": "markdown", "content": s }),
        }
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        MessageContent::Markdown(s)
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        MessageContent::Markdown(s.to_string())
    }
}

/// A detail item in a diagnostic message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailItem {
    /// The kind of detail (error, info, note)
    pub kind: DetailKind,
    /// The content of the detail
    pub content: MessageContent,
    /// Optional source location this detail points at
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceInfo>,
}

/// A diagnostic message.
///
/// Structure:
/// 1. **Code**: error code (e.g., "E101") hosts can filter on
/// 2. **Title**: brief error message
/// 3. **Kind**: Error, Warning, Info
/// 4. **Problem**: what went wrong
/// 5. **Details**: specific information, bulleted
/// 6. **Hints**: optional guidance for fixing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticMessage {
    /// Optional error code (e.g., "TM001")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Brief title for the error
    pub title: String,

    /// The kind of diagnostic (Error, Warning, Info)
    pub kind: DiagnosticKind,

    /// The problem statement
    pub problem: Option<MessageContent>,

    /// Specific error details
    pub details: Vec<DetailItem>,

    /// Optional hints for fixing
    pub hints: Vec<MessageContent>,

    /// Source location of the failing construct
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceInfo>,
}

impl DiagnosticMessage {
    /// Create a new diagnostic message with just a title and kind.
    pub fn new(kind: DiagnosticKind, title: impl Into<String>) -> Self {
        Self {
            code: None,
            title: title.into(),
            kind,
            problem: None,
            details: Vec::new(),
            hints: Vec::new(),
            location: None,
        }
    }

    /// Create an error diagnostic.
    pub fn error(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Error, title)
    }

    /// Create a warning diagnostic.
    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Warning, title)
    }

    /// Create an info diagnostic.
    pub fn info(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Info, title)
    }

    /// Set the error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// True when this diagnostic carries `code`.
    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }

    /// Render this diagnostic message as text.
    ///
    /// Format:
    /// ```text
    /// Error [TM001] at 3:7: Type mismatch
    /// Problem statement here
    /// ✖ Error detail
    /// ℹ Info detail
    /// ? Hint
    /// ```
    ///
    /// With a source context and a location, an ariadne snippet replaces the
    /// header line.
    ///
    /// # Example
    ///
    /// ```
    /// use weft_error_reporting::DiagnosticMessageBuilder;
    ///
    /// let msg = DiagnosticMessageBuilder::error("Type mismatch")
    ///     .with_code("TM001")
    ///     .problem("Cannot apply `-` to String and Int32")
    ///     .build();
    /// let text = msg.to_text(None);
    /// assert!(text.starts_with("Error [TM001]: Type mismatch"));
    /// ```
    pub fn to_text(&self, ctx: Option<&SourceContext>) -> String {
        let mut result = String::new();

        let snippet = match (ctx, self.location.as_ref()) {
            (Some(ctx), Some(loc)) => self.render_ariadne_source_context(loc, ctx),
            _ => None,
        };

        match snippet {
            Some(snippet) => {
                result.push_str(&snippet);
                for detail in self.details.iter().filter(|d| d.location.is_none()) {
                    let _ = writeln!(result, "{} {}", detail.kind.bullet(), detail.content.as_str());
                }
            }
            None => {
                result.push_str(self.kind.label());
                if let Some(code) = &self.code {
                    let _ = write!(result, " [{}]", code);
                }
                if let Some(loc) = &self.location {
                    let _ = write!(result, " at {}", loc.label());
                }
                let _ = write!(result, ": {}", self.title);
                if let Some(problem) = &self.problem {
                    let _ = write!(result, "\n{}", problem.as_str());
                }
                for detail in &self.details {
                    let _ = write!(result, "\n{} {}", detail.kind.bullet(), detail.content.as_str());
                }
            }
        }

        for hint in &self.hints {
            if !result.is_empty() && !result.ends_with('\n') {
                result.push('\n');
            }
            let _ = write!(result, "? {}", hint.as_str());
        }

        result
    }

    /// Render this diagnostic message as a JSON value.
    ///
    /// # Example
    ///
    /// ```
    /// use weft_error_reporting::DiagnosticMessage;
    ///
    /// let msg = DiagnosticMessage::warning("Key not found").with_code("E101");
    /// let json = msg.to_json();
    /// assert_eq!(json["kind"], "warning");
    /// assert_eq!(json["code"], "E101");
    /// ```
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;

        let mut obj = json!({
            "kind": self.kind,
            "title": self.title,
        });

        if let Some(code) = &self.code {
            obj["code"] = json!(code);
        }

        if let Some(problem) = &self.problem {
            obj["problem"] = problem.to_json();
        }

        if !self.details.is_empty() {
            let details: Vec<_> = self
                .details
                .iter()
                .map(|d| {
                    let mut detail_obj = json!({
                        "kind": d.kind,
                        "content": d.content.to_json()
                    });
                    if let Some(location) = &d.location {
                        detail_obj["location"] = json!(location);
                    }
                    detail_obj
                })
                .collect();
            obj["details"] = json!(details);
        }

        if !self.hints.is_empty() {
            let hints: Vec<_> = self.hints.iter().map(MessageContent::to_json).collect();
            obj["hints"] = json!(hints);
        }

        if let Some(location) = &self.location {
            obj["location"] = json!(location);
        }

        obj
    }

    /// Render source context using ariadne (private helper for to_text).
    fn render_ariadne_source_context(
        &self,
        location: &SourceInfo,
        ctx: &SourceContext,
    ) -> Option<String> {
        use ariadne::{Config, Label, Report, ReportKind, Source};

        let file = ctx.get_file(location.file_id)?;
        let content = file.text()?;

        let report_kind = match self.kind {
            DiagnosticKind::Error => ReportKind::Error,
            DiagnosticKind::Warning => ReportKind::Warning,
            DiagnosticKind::Info | DiagnosticKind::Note => ReportKind::Advice,
        };

        let len = content.len();
        let start = location.start_offset().min(len);
        let end = location.end_offset().clamp(start, len);

        let mut report = Report::build(report_kind, file.path.clone(), start)
            .with_config(Config::default().with_color(false));

        report = match &self.code {
            Some(code) => report.with_message(format!("[{}] {}", code, self.title)),
            None => report.with_message(&self.title),
        };

        let main_message = self
            .problem
            .as_ref()
            .map_or(self.title.as_str(), MessageContent::as_str);
        report = report.with_label(Label::new((file.path.clone(), start..end)).with_message(main_message));

        for detail in &self.details {
            let Some(detail_loc) = &detail.location else {
                continue;
            };
            if detail_loc.file_id != location.file_id {
                continue;
            }
            let detail_start = detail_loc.start_offset().min(len);
            let detail_end = detail_loc.end_offset().clamp(detail_start, len);
            report = report.with_label(
                Label::new((file.path.clone(), detail_start..detail_end))
                    .with_message(detail.content.as_str()),
            );
        }

        let mut output = Vec::new();
        report
            .finish()
            .write((file.path.clone(), Source::from(content.as_str())), &mut output)
            .ok()?;

        String::from_utf8(output).ok()
    }
}
