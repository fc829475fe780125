/*
 * eval_context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Evaluation context for template rendering.
//!
//! This module provides [`EvalContext`], which is threaded through all
//! evaluation functions to support:
//!
//! 1. **Diagnostics**: the [`ErrorList`] of errors and warnings with source
//!    locations
//! 2. **State**: the shared [`StateTable`], loop depth and the pending jump
//! 3. **Configuration**: strict mode and the nesting limit
//! 4. **Caches**: builtin member resolutions and compiled macro sources

use crate::ast::JumpKind;
use crate::members::MemberCache;
use crate::options::EvalOptions;
use crate::parser::Template;
use crate::resolver::TemplateLoader;
use crate::state::StateTable;
use std::collections::HashMap;
use std::rc::Rc;
use weft_error_reporting::{DiagnosticKind, DiagnosticMessage, DiagnosticMessageBuilder, get_error_info};
use weft_source_map::{FileId, SourceInfo};

/// Build a diagnostic whose title comes from the error catalog.
pub(crate) fn coded_diagnostic(
    code: &str,
    kind: DiagnosticKind,
    message: impl Into<String>,
    location: SourceInfo,
) -> DiagnosticMessage {
    let title = get_error_info(code).map_or("Template Error", |info| info.title.as_str());
    DiagnosticMessageBuilder::with_kind(kind, title)
        .with_code(code)
        .problem(message.into())
        .with_location(location)
        .build()
}

/// Ordered list of the diagnostics produced by one evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorList {
    entries: Vec<DiagnosticMessage>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: DiagnosticMessage) {
        self.entries.push(diagnostic);
    }

    pub fn error_with_code(&mut self, code: &str, message: impl Into<String>, location: SourceInfo) {
        self.push(coded_diagnostic(code, DiagnosticKind::Error, message, location));
    }

    pub fn warn_with_code(&mut self, code: &str, message: impl Into<String>, location: SourceInfo) {
        self.push(coded_diagnostic(code, DiagnosticKind::Warning, message, location));
    }

    /// Add an error in strict mode, a warning otherwise.
    pub fn warn_or_error_with_code(
        &mut self,
        strict: bool,
        code: &str,
        message: impl Into<String>,
        location: SourceInfo,
    ) {
        if strict {
            self.error_with_code(code, message, location);
        } else {
            self.warn_with_code(code, message, location);
        }
    }

    pub fn contains_error(&self) -> bool {
        self.entries.iter().any(|d| d.kind == DiagnosticKind::Error)
    }

    pub fn contains_warning(&self) -> bool {
        self.entries.iter().any(|d| d.kind == DiagnosticKind::Warning)
    }

    /// Codes of all entries, in order.
    pub fn codes(&self) -> Vec<&str> {
        self.entries.iter().filter_map(|d| d.code.as_deref()).collect()
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.entries.iter().any(|d| d.has_code(code))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DiagnosticMessage> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[DiagnosticMessage] {
        &self.entries
    }

    pub fn extend(&mut self, other: ErrorList) {
        self.entries.extend(other.entries);
    }

    pub fn into_vec(self) -> Vec<DiagnosticMessage> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a DiagnosticMessage;
    type IntoIter = std::slice::Iter<'a, DiagnosticMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl IntoIterator for ErrorList {
    type Item = DiagnosticMessage;
    type IntoIter = std::vec::IntoIter<DiagnosticMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Marker for "evaluation of this construct was abandoned"; the diagnostic
/// has already been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Failed;

pub(crate) type Eval<T> = Result<T, Failed>;

/// File id given to templates compiled from macro text.
pub(crate) const MACRO_FILE_ID: FileId = FileId(usize::MAX);

/// Context for one template evaluation.
pub struct EvalContext<'a> {
    /// Variable bindings, shared with nested evaluations.
    pub(crate) state: &'a mut StateTable,

    pub(crate) errors: ErrorList,

    /// Source of `#parse` and `#include` targets.
    pub(crate) loader: &'a dyn TemplateLoader,

    pub(crate) options: EvalOptions,

    /// Macro/`#parse` nesting depth.
    pub(crate) depth: usize,

    /// Number of enclosing loops in this template.
    pub(crate) loop_depth: usize,

    /// Set by `#break`, `#continue` and `#stop` until a loop (or the
    /// document root) consumes it.
    pub(crate) pending_jump: Option<JumpKind>,

    pub(crate) members: MemberCache,

    macros: HashMap<String, Rc<Template>>,
}

impl<'a> EvalContext<'a> {
    pub fn new(state: &'a mut StateTable, loader: &'a dyn TemplateLoader, options: EvalOptions) -> Self {
        Self {
            state,
            errors: ErrorList::new(),
            loader,
            options,
            depth: 0,
            loop_depth: 0,
            pending_jump: None,
            members: MemberCache::default(),
            macros: HashMap::new(),
        }
    }

    pub fn errors(&self) -> &ErrorList {
        &self.errors
    }

    pub fn into_errors(self) -> ErrorList {
        self.errors
    }

    /// Run `f` in a child context for a macro expansion or `#parse`.
    ///
    /// The child shares the state table and caches and has its own error
    /// list (appended to this one afterwards). It runs inside this
    /// evaluation's loops, so a `#break` or `#continue` in the child applies to
    /// the enclosing loop here, and a `#stop` stops this evaluation too.
    pub(crate) fn nested<T>(&mut self, f: impl FnOnce(&mut EvalContext<'_>) -> T) -> T {
        let mut child = EvalContext {
            state: &mut *self.state,
            errors: ErrorList::new(),
            loader: self.loader,
            options: self.options,
            depth: self.depth + 1,
            loop_depth: self.loop_depth,
            pending_jump: None,
            members: std::mem::take(&mut self.members),
            macros: std::mem::take(&mut self.macros),
        };
        let result = f(&mut child);

        let EvalContext {
            errors,
            pending_jump,
            members,
            macros,
            ..
        } = child;
        self.errors.extend(errors);
        self.members = members;
        self.macros = macros;
        if pending_jump.is_some() {
            self.pending_jump = pending_jump;
        }
        result
    }

    /// Whether another macro or `#parse` level is allowed.
    pub(crate) fn can_nest(&self) -> bool {
        self.depth < self.options.max_nesting_depth
    }

    /// The compiled form of a macro source, compiled once per evaluation.
    pub(crate) fn compiled_macro(&mut self, source: &str) -> Rc<Template> {
        if let Some(template) = self.macros.get(source) {
            return Rc::clone(template);
        }
        let template = Rc::new(Template::compile_with(
            source,
            "<macro>",
            MACRO_FILE_ID,
            &Default::default(),
        ));
        self.macros.insert(source.to_string(), Rc::clone(&template));
        template
    }

    /// Record an error and abandon the current construct.
    pub(crate) fn fail(&mut self, code: &str, message: impl Into<String>, location: &SourceInfo) -> Failed {
        self.errors.error_with_code(code, message, *location);
        Failed
    }

    /// Record a lookup miss: a warning, or an error that abandons the
    /// construct in strict mode.
    pub(crate) fn lookup_miss(
        &mut self,
        code: &str,
        message: impl Into<String>,
        location: &SourceInfo,
    ) -> Eval<()> {
        let strict = self.options.strict_mode;
        self.errors.warn_or_error_with_code(strict, code, message, *location);
        if strict { Err(Failed) } else { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::NullResolver;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_list_severities() {
        let mut errors = ErrorList::new();
        assert!(errors.is_empty());
        assert!(!errors.contains_error());

        errors.warn_with_code("E101", "`x` is not defined", SourceInfo::default());
        assert!(errors.contains_warning());
        assert!(!errors.contains_error());

        errors.error_with_code("R902", "`#break` outside a loop", SourceInfo::default());
        assert!(errors.contains_error());
        assert_eq!(errors.codes(), vec!["E101", "R902"]);
        assert!(errors.has_code("R902"));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_diagnostic_title_from_catalog() {
        let mut errors = ErrorList::new();
        errors.warn_with_code("E101", "`user` is not defined", SourceInfo::default());
        let diagnostic = &errors.as_slice()[0];
        assert_eq!(diagnostic.title, "Key Not Found");
        assert_eq!(
            diagnostic.problem.as_ref().map(|p| p.as_str()),
            Some("`user` is not defined")
        );
    }

    #[test]
    fn test_warn_or_error() {
        let mut errors = ErrorList::new();
        errors.warn_or_error_with_code(false, "E102", "missing", SourceInfo::default());
        errors.warn_or_error_with_code(true, "E102", "missing", SourceInfo::default());
        let kinds: Vec<_> = errors.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![DiagnosticKind::Warning, DiagnosticKind::Error]);
    }

    #[test]
    fn test_lookup_miss_fails_only_in_strict_mode() {
        let mut state = StateTable::new();
        let mut ctx = EvalContext::new(&mut state, &NullResolver, EvalOptions::default());
        assert_eq!(ctx.lookup_miss("E101", "x", &SourceInfo::default()), Ok(()));

        let mut state = StateTable::new();
        let options = EvalOptions::default().with_strict_mode(true);
        let mut ctx = EvalContext::new(&mut state, &NullResolver, options);
        assert_eq!(ctx.lookup_miss("E101", "x", &SourceInfo::default()), Err(Failed));
        assert!(ctx.errors().contains_error());
    }

    #[test]
    fn test_nested_merges_errors_and_stop() {
        let mut state = StateTable::new();
        let mut ctx = EvalContext::new(&mut state, &NullResolver, EvalOptions::default());

        let child_depth = ctx.nested(|child| {
            child.state.insert("seen", true);
            child.errors.error_with_code("R901", "boom", SourceInfo::default());
            child.pending_jump = Some(JumpKind::Stop);
            child.depth
        });

        assert_eq!(child_depth, 1);
        assert!(ctx.errors().has_code("R901"));
        assert_eq!(ctx.pending_jump, Some(JumpKind::Stop));
        assert!(ctx.state.contains("seen"));
    }

    #[test]
    fn test_nested_runs_inside_enclosing_loop() {
        let mut state = StateTable::new();
        let mut ctx = EvalContext::new(&mut state, &NullResolver, EvalOptions::default());
        ctx.loop_depth = 2;

        let child_loops = ctx.nested(|child| {
            child.pending_jump = Some(JumpKind::Break);
            child.loop_depth
        });

        assert_eq!(child_loops, 2);
        assert_eq!(ctx.loop_depth, 2);
        assert_eq!(ctx.pending_jump, Some(JumpKind::Break));
    }

    #[test]
    fn test_compiled_macro_is_cached() {
        let mut state = StateTable::new();
        let mut ctx = EvalContext::new(&mut state, &NullResolver, EvalOptions::default());
        let first = ctx.compiled_macro("$(x)");
        let second = ctx.compiled_macro("$(x)");
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.file_id(), MACRO_FILE_ID);
    }
}
