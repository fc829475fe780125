/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template loading and caching.
//!
//! Evaluation itself never fails with these: problems found while
//! evaluating are collected in an [`ErrorList`](crate::ErrorList).

use thiserror::Error;

/// Errors that can occur outside of evaluation.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// No resolver knows a template by this name.
    #[error("Template not found: {name}")]
    TemplateNotFound { name: String },

    /// A cache lock was poisoned by a panicking compile.
    #[error("Template cache lock poisoned while loading {name}")]
    CachePoisoned { name: String },

    /// Invalid configuration value.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// I/O error (e.g., reading a template file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;
