//! # Context Index Store
//!
//! In-memory index of workspace files: content, symbols, imports and one
//! embedding per file, with exact, positional and similarity queries.
//!
//! ## Architecture
//!
//! ```text
//! FileIndexEntry (path → content, symbols, imports, embedding)
//!     │
//!     ├──> entries: HashMap<path, FileIndexEntry>
//!     │      ├─> find_at_position → tightest enclosing SymbolInfo
//!     │      └─> find_similar     → brute-force cosine ranking
//!     │
//!     └──> by_name: HashMap<name, Vec<SymbolInfo>>
//!            └─> find_by_name
//! ```
//!
//! Every stored vector carries the `model_id` of the provider that produced
//! it; similarity queries only compare vectors from the same model.
//!
//! ## Example
//!
//! ```no_run
//! use context_index_store::{EmbeddingProvider, IndexStore, StubEmbedder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = IndexStore::new();
//!     let embedder = StubEmbedder::new(384);
//!
//!     let query = embedder.embed_tagged("parse configuration file").await?;
//!     for hit in store.find_similar(&query, 5, 0.3) {
//!         println!("{}: {:.3}", hit.path, hit.score);
//!     }
//!     Ok(())
//! }
//! ```

mod embeddings;
mod error;
mod similarity;
mod store;
mod types;

pub use embeddings::{
    provider_from_config, truncate_for_embedding, EmbeddingProvider, HttpEmbedder,
    OllamaSettings, OpenAiSettings, ProviderConfig, StubEmbedder, MAX_EMBED_CHARS,
};
pub use error::{IndexStoreError, Result};
pub use similarity::{cosine_similarity, SIMILARITY_EPSILON};
pub use store::IndexStore;
pub use types::{Embedding, FileIndexEntry, SimilarFile};

// Re-export symbol types for convenience
pub use context_symbols::{Span, SymbolInfo, SymbolKind};
