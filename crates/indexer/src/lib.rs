//! # Context Indexer
//!
//! Batch indexing of one or more workspace roots into an [`IndexStore`].
//!
//! ## Pipeline
//!
//! ```text
//! Workspace roots
//!     │
//!     ├──> File Scanner (ignore filter incl. root .gitignore)
//!     │      └─> Sorted candidate list
//!     │
//!     ├──> Batches (N files concurrently, barrier between batches)
//!     │      ├─> Symbol extraction (tree-sitter)
//!     │      └─> Embedding (provider)
//!     │
//!     └──> Index Store
//!            └─> Entries keyed by root-relative path
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use context_index_store::{IndexStore, StubEmbedder};
//! use context_indexer::{IndexOutcome, WorkspaceIndexer, DEFAULT_BATCH_SIZE};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let indexer = WorkspaceIndexer::new(
//!         vec!["/path/to/project".into()],
//!         Arc::new(IndexStore::new()),
//!         Arc::new(StubEmbedder::new(384)),
//!     )?;
//!
//!     if let IndexOutcome::Completed(stats) =
//!         indexer.index_workspace(DEFAULT_BATCH_SIZE, None).await?
//!     {
//!         println!("Indexed {} files, {} symbols", stats.files, stats.symbols);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! [`IndexStore`]: context_index_store::IndexStore

mod error;
mod ignore_filter;
mod indexer;
mod scanner;
mod stats;
mod watcher;

pub use error::{IndexerError, Result};
pub use ignore_filter::{has_binary_extension, IgnoreFilter, IGNORE_FILE_NAME};
pub use indexer::{
    AttachOutcome, IndexOutcome, IndexProgress, ProgressFn, WorkspaceIndexer, DEFAULT_BATCH_SIZE,
};
pub use scanner::{relative_key, FileScanner, ScanOptions};
pub use stats::IndexStats;
pub use watcher::{WatchUpdate, WatcherConfig, WorkspaceWatcher};
