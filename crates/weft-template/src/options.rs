/*
 * options.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compile and evaluation options.
//!
//! [`WeftConfig`] is the serde shape of a `weft.toml` file; the CLI loads it
//! and turns it into [`CompileOptions`] and [`EvalOptions`].

use crate::error::{TemplateError, TemplateResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Whitespace policy around directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrimMode {
    /// Only the line break right after a directive is removed.
    #[default]
    Standard,
    /// Also removes the indentation in front of a directive that starts its
    /// line, and trailing blanks after a directive.
    Greedy,
}

impl FromStr for TrimMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(TrimMode::Standard),
            "greedy" => Ok(TrimMode::Greedy),
            other => Err(format!("unknown trim mode `{other}` (expected `standard` or `greedy`)")),
        }
    }
}

impl fmt::Display for TrimMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrimMode::Standard => "standard",
            TrimMode::Greedy => "greedy",
        })
    }
}

/// Options that affect how source text is tokenized and parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompileOptions {
    /// Initial trim mode; `#pragma(trim, ...)` can switch it mid-template.
    pub trim: TrimMode,
}

/// Options that affect evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalOptions {
    /// Report lookup warnings (E101, E102, E103, I001) as errors.
    pub strict_mode: bool,

    /// Maximum nesting of macro expansions and `#parse` calls.
    pub max_nesting_depth: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            strict_mode: false,
            max_nesting_depth: 32,
        }
    }
}

impl EvalOptions {
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }
}

/// Contents of a `weft.toml` configuration file.
///
/// ```toml
/// template_dirs = ["templates", "shared"]
/// trim = "greedy"
/// strict = true
/// max_nesting_depth = 16
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeftConfig {
    /// Directories searched, in order, by `#parse` and `#include`.
    pub template_dirs: Vec<PathBuf>,
    pub trim: TrimMode,
    pub strict: bool,
    pub max_nesting_depth: usize,
}

impl Default for WeftConfig {
    fn default() -> Self {
        Self {
            template_dirs: Vec::new(),
            trim: TrimMode::default(),
            strict: false,
            max_nesting_depth: EvalOptions::default().max_nesting_depth,
        }
    }
}

impl WeftConfig {
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions { trim: self.trim }
    }

    /// Reject values that would make every evaluation fail.
    pub fn validate(&self) -> TemplateResult<()> {
        if self.max_nesting_depth == 0 {
            return Err(TemplateError::InvalidConfig {
                message: "max_nesting_depth must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn eval_options(&self) -> EvalOptions {
        EvalOptions {
            strict_mode: self.strict,
            max_nesting_depth: self.max_nesting_depth,
        }
    }
}
