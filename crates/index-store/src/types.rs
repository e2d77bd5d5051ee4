use context_symbols::SymbolInfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::SystemTime;

/// A vector tagged with the provider/model that produced it.
///
/// Vectors from different models are never compared with each other.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Embedding {
    pub model_id: String,
    pub vector: Vec<f32>,
}

impl Embedding {
    pub fn new(model_id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            model_id: model_id.into(),
            vector,
        }
    }

    /// Placeholder stored when the provider failed for a file
    pub fn zero(model_id: impl Into<String>, dimension: usize) -> Self {
        Self::new(model_id, vec![0.0; dimension])
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.vector.iter().all(|v| *v == 0.0)
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// One file's current indexed state. Replaced wholesale on re-index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileIndexEntry {
    /// Workspace-relative key, unique within the store
    pub path: String,
    pub content: String,
    pub language: String,
    pub symbols: Vec<SymbolInfo>,
    pub imports: BTreeSet<String>,
    pub embedding: Embedding,
    pub last_modified: SystemTime,
}

/// Ranked similarity hit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarFile {
    pub path: String,
    pub score: f32,
    /// First declared symbol of the file, when it has any
    pub symbol: Option<SymbolInfo>,
}
