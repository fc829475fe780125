/*
 * tokens.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Dump the token stream of a template.
 */

use anyhow::{Context, Result};
use std::fmt::Write;
use std::path::Path;
use weft_template::{Token, TrimMode, tokenize};

pub fn execute(template: &Path, trim: TrimMode) -> Result<()> {
    let source = std::fs::read_to_string(template)
        .with_context(|| format!("Failed to read template {}", template.display()))?;
    print!("{}", format_tokens(&tokenize(&source, trim)));
    Ok(())
}

/// One line per token: byte range, construct depth and kind.
pub fn format_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        let _ = writeln!(
            out,
            "{:>5}..{:<5} {:>2} {:?}",
            token.start, token.end, token.depth, token.kind
        );
    }
    out
}
