/*
 * diagnostics.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Printing diagnostics to stderr.
 */

use anyhow::Result;
use weft_error_reporting::{DiagnosticKind, DiagnosticMessage};
use weft_source_map::SourceContext;

/// Diagnostics as a JSON array, one object per diagnostic.
pub fn to_json(diagnostics: &[DiagnosticMessage]) -> serde_json::Value {
    serde_json::Value::Array(diagnostics.iter().map(DiagnosticMessage::to_json).collect())
}

/// Print diagnostics to stderr, rendered against `sources` or as JSON.
pub fn report(diagnostics: &[DiagnosticMessage], sources: &SourceContext, json: bool) -> Result<()> {
    if json {
        eprintln!("{}", serde_json::to_string_pretty(&to_json(diagnostics))?);
        return Ok(());
    }
    for diagnostic in diagnostics {
        eprintln!("{}", diagnostic.to_text(Some(sources)));
    }
    Ok(())
}

pub fn count_errors(diagnostics: &[DiagnosticMessage]) -> usize {
    diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::Error)
        .count()
}
