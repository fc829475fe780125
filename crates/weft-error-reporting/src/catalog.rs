//! Error code catalog and lookup.
//!
//! This module provides access to the centralized error catalog, which maps
//! error codes (like "E101") to their metadata (subsystem, default severity,
//! title and message template).
//!
//! Codes are grouped by prefix: `P` parse, `TM` type mismatch, `E1xx`
//! property/function lookup, `R9xx` runtime, `I0xx` indexer, `C1xx` constant.

use crate::diagnostic::DiagnosticKind;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata for an error code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorCodeInfo {
    /// Subsystem name (e.g., "parse", "lookup", "runtime")
    pub subsystem: String,

    /// Severity the evaluator reports this code with outside strict mode
    pub severity: DiagnosticKind,

    /// Short title for the error
    pub title: String,

    /// Default message template (may include placeholders)
    pub message_template: String,

    /// When this error was introduced (version)
    pub since_version: String,
}

/// Global error catalog, loaded lazily from JSON at compile time.
///
/// The catalog is embedded with `include_str!()`, so there is no runtime
/// file I/O.
///
/// # Panics
///
/// Panics if the embedded JSON is invalid, which is caught by the tests below.
pub static ERROR_CATALOG: Lazy<HashMap<String, ErrorCodeInfo>> = Lazy::new(|| {
    let json_data = include_str!("../error_catalog.json");
    serde_json::from_str(json_data).expect("Invalid error catalog JSON")
});

/// Look up error code information.
///
/// # Example
///
/// ```
/// use weft_error_reporting::catalog::get_error_info;
///
/// let info = get_error_info("E101").unwrap();
/// assert_eq!(info.title, "Key Not Found");
/// ```
pub fn get_error_info(code: &str) -> Option<&ErrorCodeInfo> {
    ERROR_CATALOG.get(code)
}

/// Get the subsystem name for an error code.
///
/// # Example
///
/// ```
/// use weft_error_reporting::catalog::get_subsystem;
///
/// assert_eq!(get_subsystem("R902"), Some("runtime"));
/// ```
pub fn get_subsystem(code: &str) -> Option<&str> {
    ERROR_CATALOG.get(code).map(|info| info.subsystem.as_str())
}

/// Default severity of a code; unknown codes are errors.
pub fn default_kind(code: &str) -> DiagnosticKind {
    ERROR_CATALOG
        .get(code)
        .map_or(DiagnosticKind::Error, |info| info.severity)
}
