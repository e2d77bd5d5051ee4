use crate::error::{Result, SearchError};
use context_index_store::{EmbeddingProvider, IndexStore};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

const TRUNCATION_MARKER: &str = "\n… (truncated)";

/// Runtime-tunable retrieval settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Kill switch checked before any embedding call
    pub enabled: bool,

    /// Files included per retrieval
    pub max_chunks: usize,

    /// Characters kept per file
    pub max_chunk_size: usize,

    pub min_similarity: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_chunks: 5,
            max_chunk_size: 2000,
            min_similarity: 0.5,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        check_count("max_chunks", self.max_chunks)?;
        check_count("max_chunk_size", self.max_chunk_size)?;
        check_similarity(self.min_similarity)
    }
}

fn check_count(field: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(SearchError::InvalidConfig(format!(
            "{field} must be greater than 0"
        )));
    }
    Ok(())
}

fn check_similarity(value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(SearchError::InvalidConfig(format!(
            "min_similarity must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}

/// One file that contributed to a retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSource {
    pub path: String,
    pub score: f32,
    pub truncated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub text: String,
    pub sources: Vec<ContextSource>,
}

impl RetrievedContext {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Turns a free-text query into a prompt-ready block of the most similar files.
///
/// Retrieval is best effort: a disabled config, an empty query or a failing
/// provider all yield an empty context instead of an error.
pub struct ContextAssembler {
    store: Arc<IndexStore>,
    provider: Arc<dyn EmbeddingProvider>,
    config: RwLock<RetrievalConfig>,
}

impl ContextAssembler {
    pub fn new(
        store: Arc<IndexStore>,
        provider: Arc<dyn EmbeddingProvider>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            provider,
            config: RwLock::new(config),
        })
    }

    pub fn config(&self) -> RetrievalConfig {
        *self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace every setting at once; the old config stays on error
    pub fn reload(&self, config: RetrievalConfig) -> Result<()> {
        config.validate()?;
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        log::debug!("Retrieval config reloaded: {config:?}");
        Ok(())
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.update(|config| config.enabled = enabled);
    }

    pub fn set_max_chunks(&self, max_chunks: usize) -> Result<()> {
        check_count("max_chunks", max_chunks)?;
        self.update(|config| config.max_chunks = max_chunks);
        Ok(())
    }

    pub fn set_max_chunk_size(&self, max_chunk_size: usize) -> Result<()> {
        check_count("max_chunk_size", max_chunk_size)?;
        self.update(|config| config.max_chunk_size = max_chunk_size);
        Ok(())
    }

    pub fn set_min_similarity(&self, min_similarity: f32) -> Result<()> {
        check_similarity(min_similarity)?;
        self.update(|config| config.min_similarity = min_similarity);
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut RetrievalConfig)) {
        let mut guard = self.config.write().unwrap_or_else(PoisonError::into_inner);
        apply(&mut guard);
    }

    pub async fn retrieve(&self, query: &str) -> RetrievedContext {
        let config = self.config();
        if !config.enabled {
            return RetrievedContext::default();
        }
        let query = query.trim();
        if query.is_empty() {
            return RetrievedContext::default();
        }

        let embedding = match self.provider.embed_tagged(query).await {
            Ok(embedding) => embedding,
            Err(err) => {
                log::warn!("Query embedding failed; retrieving no context: {err}");
                return RetrievedContext::default();
            }
        };

        let hits = self
            .store
            .find_similar(&embedding, config.max_chunks, config.min_similarity);

        let mut chunks = Vec::with_capacity(hits.len());
        let mut sources = Vec::with_capacity(hits.len());
        for hit in hits {
            // Entry may have been removed since ranking
            let Some(entry) = self.store.get(&hit.path) else {
                continue;
            };
            let (content, truncated) = truncate_chars(&entry.content, config.max_chunk_size);
            let mut chunk = format!("--- {} (score {:.2}) ---\n{content}", hit.path, hit.score);
            if truncated {
                chunk.push_str(TRUNCATION_MARKER);
            }
            chunks.push(chunk);
            sources.push(ContextSource {
                path: hit.path,
                score: hit.score,
                truncated,
            });
        }

        log::debug!("Retrieved {} context chunks for query", sources.len());
        RetrievedContext {
            text: chunks.join("\n\n"),
            sources,
        }
    }
}

/// Cut `text` to at most `max_chars` characters on a char boundary
fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_index_store::StubEmbedder;
    use pretty_assertions::assert_eq;

    fn assembler() -> ContextAssembler {
        ContextAssembler::new(
            Arc::new(IndexStore::new()),
            Arc::new(StubEmbedder::new(8)),
            RetrievalConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn config_defaults_and_partial_toml() {
        let config: RetrievalConfig = toml::from_str("max_chunks = 3").unwrap();
        assert_eq!(
            config,
            RetrievalConfig {
                max_chunks: 3,
                ..RetrievalConfig::default()
            }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn setters_reject_invalid_values_and_keep_previous() {
        let assembler = assembler();
        assert!(assembler.set_max_chunks(0).is_err());
        assert!(assembler.set_max_chunk_size(0).is_err());
        assert!(assembler.set_min_similarity(1.5).is_err());
        assert!(assembler.set_min_similarity(f32::NAN).is_err());
        assert_eq!(assembler.config(), RetrievalConfig::default());

        assembler.set_max_chunks(2).unwrap();
        assembler.set_min_similarity(0.0).unwrap();
        assembler.set_enabled(false);
        let config = assembler.config();
        assert_eq!(config.max_chunks, 2);
        assert_eq!(config.min_similarity, 0.0);
        assert!(!config.enabled);
    }

    #[test]
    fn reload_is_all_or_nothing() {
        let assembler = assembler();
        let bad = RetrievalConfig {
            max_chunks: 10,
            max_chunk_size: 0,
            ..RetrievalConfig::default()
        };
        assert!(assembler.reload(bad).is_err());
        assert_eq!(assembler.config().max_chunks, 5);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), ("hé", true));
        assert_eq!(truncate_chars("abc", 3), ("abc", false));
    }

    #[tokio::test]
    async fn blank_query_yields_empty_context() {
        let context = assembler().retrieve("   ").await;
        assert!(context.is_empty());
        assert_eq!(context.text, "");
    }
}
