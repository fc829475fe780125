//! Source context for managing files

use crate::file_info::FileInformation;
use crate::types::FileId;
use serde::{Deserialize, Serialize};

use std::collections::HashMap;

/// Context for managing source files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceContext {
    files: Vec<SourceFile>,
    /// Sparse mapping for non-sequential file IDs (e.g., ids handed out by a
    /// template cache). Only populated when add_file_with_id is used.
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    file_id_map: HashMap<usize, usize>,
}

/// A source file with content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// File path or template name
    pub path: String,
    /// File content (for in-memory templates). When None, content is read
    /// from disk using the path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Line index for location lookups
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_info: Option<FileInformation>,
}

impl SourceFile {
    /// The file's text: stored content, or the file read from disk.
    pub fn text(&self) -> Option<String> {
        match &self.content {
            Some(c) => Some(c.clone()),
            None => std::fs::read_to_string(&self.path).ok(),
        }
    }
}

impl SourceContext {
    /// Create a new empty source context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file to the context and return its ID
    ///
    /// - If content is Some: creates an in-memory file.
    /// - If content is None: creates a disk-backed file; its line index is
    ///   built by reading the path when it exists.
    pub fn add_file(&mut self, path: String, content: Option<String>) -> FileId {
        let id = FileId(self.files.len());
        self.files.push(Self::make_file(path, content));
        id
    }

    /// Add a file with a specific FileId
    ///
    /// # Panics
    ///
    /// Panics if the FileId already exists in the context.
    pub fn add_file_with_id(
        &mut self,
        id: FileId,
        path: String,
        content: Option<String>,
    ) -> FileId {
        if self.get_file(id).is_some() {
            panic!("FileId {:?} already exists in SourceContext", id);
        }

        let index = self.files.len();
        self.files.push(Self::make_file(path, content));
        self.file_id_map.insert(id.0, index);
        id
    }

    /// Get a file by ID
    pub fn get_file(&self, id: FileId) -> Option<&SourceFile> {
        if let Some(&index) = self.file_id_map.get(&id.0) {
            return self.files.get(index);
        }
        if self.file_id_map.is_empty() {
            return self.files.get(id.0);
        }
        None
    }

    /// Number of registered files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True when no file has been registered
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn make_file(path: String, content: Option<String>) -> SourceFile {
        let file_info = match &content {
            Some(c) => Some(FileInformation::new(c)),
            None => std::fs::read_to_string(&path)
                .ok()
                .map(|c| FileInformation::new(&c)),
        };
        SourceFile {
            path,
            content,
            file_info,
        }
    }
}
