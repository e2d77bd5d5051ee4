use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Statistics about one indexing run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStats {
    /// Files stored in the index
    pub files: usize,

    /// Symbols extracted across those files
    pub symbols: usize,

    /// Files stored with empty symbol data because parsing failed
    pub parse_failures: usize,

    /// Files stored with a zero vector because the provider failed
    pub embedding_failures: usize,

    /// Entries dropped because their file disappeared
    pub purged: usize,

    /// Time taken in milliseconds
    pub time_ms: u64,

    /// Files per language
    pub languages: HashMap<String, usize>,

    /// Files skipped entirely (read errors, panicked tasks)
    pub errors: Vec<String>,
}

impl IndexStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, language: &str, symbols: usize) {
        self.files += 1;
        self.symbols += symbols;
        *self.languages.entry(language.to_string()).or_insert(0) += 1;
    }

    pub fn add_parse_failure(&mut self) {
        self.parse_failures += 1;
    }

    pub fn add_embedding_failure(&mut self) {
        self.embedding_failures += 1;
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn counts_files_per_language() {
        let mut stats = IndexStats::new();
        stats.add_file("typescript", 3);
        stats.add_file("typescript", 1);
        stats.add_file("python", 0);
        stats.add_error("broken.bin: stream did not contain valid UTF-8".to_string());

        assert_eq!(stats.files, 3);
        assert_eq!(stats.symbols, 4);
        assert_eq!(stats.languages["typescript"], 2);
        assert_eq!(stats.errors.len(), 1);
    }
}
