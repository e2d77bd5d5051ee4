//! # Context Search
//!
//! Query side of the workspace index: symbol lookups, similarity ranking and
//! retrieval-augmented context assembly behind one [`CodeIndexService`].
//!
//! ## Retrieval
//!
//! ```text
//! query text
//!     │
//!     ├──> RetrievalConfig.enabled? ── no ──> empty context
//!     │
//!     ├──> Embedding Provider (failure ⇒ empty context)
//!     │
//!     ├──> Index Store: cosine rank, min_similarity, top max_chunks
//!     │
//!     └──> "--- path (score) ---" blocks, each cut to max_chunk_size
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use context_index_store::StubEmbedder;
//! use context_search::{CodeIndexService, RetrievalConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = CodeIndexService::new(
//!         vec!["/path/to/project".into()],
//!         Arc::new(StubEmbedder::new(384)),
//!         RetrievalConfig::default(),
//!     )?;
//!     service.index_workspace(20, None).await?;
//!
//!     let context = service.retrieve_context("parse the config file").await;
//!     println!("{}", context.text);
//!     Ok(())
//! }
//! ```

mod assembler;
mod error;
mod service;

pub use assembler::{ContextAssembler, ContextSource, RetrievalConfig, RetrievedContext};
pub use error::{Result, SearchError};
pub use service::CodeIndexService;
