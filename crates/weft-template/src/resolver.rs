/*
 * resolver.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template resolution.
//!
//! This module provides traits and implementations for loading the templates
//! named by `#parse` and `#include` from various sources (filesystem, memory,
//! etc.). The evaluator only sees a [`TemplateLoader`]; the usual loader is a
//! [`TemplateCache`](crate::cache::TemplateCache) wrapping one of the
//! resolvers below.

use crate::error::{TemplateError, TemplateResult};
use crate::parser::Template;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extension tried when a template name has none.
pub const TEMPLATE_EXTENSION: &str = "weft";

/// Trait for finding template source text by name.
pub trait TemplateResolver: Send + Sync {
    /// Load a template's source.
    ///
    /// # Arguments
    /// * `name` - The name used in the template (e.g., "header", "mail/footer.weft")
    ///
    /// # Returns
    /// The template source text, or `None` if not found.
    fn resolve(&self, name: &str) -> Option<String>;
}

/// What the evaluator needs from its environment.
pub trait TemplateLoader {
    /// Raw source, for `#include`.
    fn resolve(&self, name: &str) -> Option<String>;

    /// Compiled template, for `#parse`.
    fn get_compiled(&self, name: &str) -> TemplateResult<Arc<Template>>;
}

/// Resolver that searches an ordered list of directories.
///
/// Path resolution rules:
/// - If the name has an extension, it is used as-is
/// - If it has none, `<name>` is tried first, then `<name>.weft`
/// - The first directory containing a match wins
#[derive(Debug, Clone, Default)]
pub struct FileSystemResolver {
    search_dirs: Vec<PathBuf>,
}

impl FileSystemResolver {
    pub fn new(search_dirs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            search_dirs: search_dirs.into_iter().map(Into::into).collect(),
        }
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// The file a name refers to, if it exists.
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        self.search_dirs
            .iter()
            .flat_map(|dir| candidate_paths(name, dir))
            .find(|path| path.is_file())
    }
}

impl TemplateResolver for FileSystemResolver {
    fn resolve(&self, name: &str) -> Option<String> {
        let path = self.find(name)?;
        std::fs::read_to_string(path).ok()
    }
}

/// Candidate files for `name` inside `dir`, in lookup order.
pub fn candidate_paths(name: &str, dir: &Path) -> Vec<PathBuf> {
    let path = dir.join(name);
    if Path::new(name).extension().is_some() {
        vec![path]
    } else {
        let with_extension = path.with_extension(TEMPLATE_EXTENSION);
        vec![path, with_extension]
    }
}

/// Resolver that returns nothing.
///
/// Use this when templates don't use `#parse` or `#include`, or in tests
/// where every lookup should fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullResolver;

impl TemplateResolver for NullResolver {
    fn resolve(&self, _name: &str) -> Option<String> {
        None
    }
}

impl TemplateLoader for NullResolver {
    fn resolve(&self, _name: &str) -> Option<String> {
        None
    }

    fn get_compiled(&self, name: &str) -> TemplateResult<Arc<Template>> {
        Err(TemplateError::TemplateNotFound {
            name: name.to_string(),
        })
    }
}

/// Resolver that loads templates from an in-memory map.
///
/// Useful for testing and for scenarios where templates are bundled
/// into the application.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    templates: HashMap<String, String>,
}

impl MemoryResolver {
    /// Create a new empty memory resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a template.
    pub fn add(&mut self, name: impl Into<String>, content: impl Into<String>) -> &mut Self {
        self.templates.insert(name.into(), content.into());
        self
    }

    /// Create a resolver with the given templates.
    pub fn with_templates(
        templates: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        let mut resolver = Self::new();
        for (name, content) in templates {
            resolver.add(name, content);
        }
        resolver
    }
}

impl TemplateResolver for MemoryResolver {
    fn resolve(&self, name: &str) -> Option<String> {
        self.templates.get(name).cloned()
    }
}
