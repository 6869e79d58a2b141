//! Project configuration

use std::path::Path;

use indexmap::IndexMap;

use crate::syntax::Language;

/// Settings of a [`Project`](super::Project)
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    /// Rebuild views of unloaded files from their persisted stub trees
    /// instead of reading and parsing the text
    pub use_stub_index: bool,
    /// File extension (without the dot) to language associations
    pub file_types: IndexMap<String, Language>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        let mut file_types = IndexMap::new();
        file_types.insert("mini".to_string(), Language::Mini);
        file_types.insert("txt".to_string(), Language::PlainText);
        Self {
            use_stub_index: true,
            file_types,
        }
    }
}

impl ProjectConfig {
    /// Language for a path by its extension; plain text when unknown
    pub fn language_for(&self, path: &Path) -> Language {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.file_types.get(ext))
            .copied()
            .unwrap_or(Language::PlainText)
    }

    pub fn with_file_type(mut self, extension: impl Into<String>, language: Language) -> Self {
        self.file_types.insert(extension.into(), language);
        self
    }

    pub fn with_stub_index(mut self, enabled: bool) -> Self {
        self.use_stub_index = enabled;
        self
    }
}
