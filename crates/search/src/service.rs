use crate::assembler::{ContextAssembler, RetrievalConfig, RetrievedContext};
use crate::error::Result;
use context_index_store::{Embedding, EmbeddingProvider, IndexStore, SimilarFile, SymbolInfo};
use context_indexer::{
    AttachOutcome, IndexOutcome, ProgressFn, ScanOptions, WatcherConfig, WorkspaceIndexer,
    WorkspaceWatcher,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Single entry point for editor and agent layers.
///
/// Owns the store, the scheduler and the assembler; construct one per
/// workspace session and share it by reference or `Arc`.
pub struct CodeIndexService {
    indexer: Arc<WorkspaceIndexer>,
    assembler: ContextAssembler,
}

impl CodeIndexService {
    pub fn new(
        roots: Vec<PathBuf>,
        provider: Arc<dyn EmbeddingProvider>,
        retrieval: RetrievalConfig,
    ) -> Result<Self> {
        Self::with_scan_options(roots, provider, retrieval, ScanOptions::default())
    }

    pub fn with_scan_options(
        roots: Vec<PathBuf>,
        provider: Arc<dyn EmbeddingProvider>,
        retrieval: RetrievalConfig,
        scan_options: ScanOptions,
    ) -> Result<Self> {
        let store = Arc::new(IndexStore::new());
        let indexer = WorkspaceIndexer::with_options(
            roots,
            Arc::clone(&store),
            Arc::clone(&provider),
            scan_options,
        )?;
        let assembler = ContextAssembler::new(store, provider, retrieval)?;
        Ok(Self {
            indexer: Arc::new(indexer),
            assembler,
        })
    }

    pub fn store(&self) -> &Arc<IndexStore> {
        self.indexer.store()
    }

    pub fn indexer(&self) -> &Arc<WorkspaceIndexer> {
        &self.indexer
    }

    pub async fn index_workspace(
        &self,
        batch_size: usize,
        on_progress: Option<&ProgressFn<'_>>,
    ) -> Result<IndexOutcome> {
        Ok(self.indexer.index_workspace(batch_size, on_progress).await?)
    }

    pub async fn attach_file(&self, path: impl AsRef<Path>) -> Result<AttachOutcome> {
        Ok(self.indexer.attach_file(path).await?)
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) -> bool {
        self.indexer.remove_file(path)
    }

    pub fn cancel_indexing(&self) {
        self.indexer.cancel_scan();
    }

    pub fn is_indexing(&self) -> bool {
        self.indexer.is_indexing()
    }

    /// Start re-indexing saved and deleted files in the background
    pub fn watch(&self, config: WatcherConfig) -> Result<WorkspaceWatcher> {
        Ok(WorkspaceWatcher::start(Arc::clone(&self.indexer), config)?)
    }

    /// `path` may be absolute or workspace-relative; `line` is 1-based
    pub fn find_symbol_at_position(
        &self,
        path: impl AsRef<Path>,
        line: usize,
        ch: usize,
    ) -> Option<SymbolInfo> {
        let key = self.indexer.key_of(path)?;
        self.store().find_at_position(&key, line, ch)
    }

    pub fn find_symbol_by_name(&self, name: &str) -> Vec<SymbolInfo> {
        self.store().find_by_name(name)
    }

    pub fn find_similar_symbols(
        &self,
        query: &Embedding,
        top_n: usize,
        min_similarity: f32,
    ) -> Vec<SimilarFile> {
        self.store().find_similar(query, top_n, min_similarity)
    }

    /// Embed `text` with the workspace provider, then rank like
    /// [`CodeIndexService::find_similar_symbols`]
    pub async fn find_similar_to_text(
        &self,
        text: &str,
        top_n: usize,
        min_similarity: f32,
    ) -> Result<Vec<SimilarFile>> {
        let query = self.indexer.provider().embed_tagged(text).await?;
        Ok(self.find_similar_symbols(&query, top_n, min_similarity))
    }

    pub async fn retrieve_context(&self, query: &str) -> RetrievedContext {
        self.assembler.retrieve(query).await
    }

    pub fn retrieval_config(&self) -> RetrievalConfig {
        self.assembler.config()
    }

    pub fn reload_retrieval(&self, config: RetrievalConfig) -> Result<()> {
        self.assembler.reload(config)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.assembler.set_enabled(enabled);
    }

    pub fn set_max_chunks(&self, max_chunks: usize) -> Result<()> {
        self.assembler.set_max_chunks(max_chunks)
    }

    pub fn set_max_chunk_size(&self, max_chunk_size: usize) -> Result<()> {
        self.assembler.set_max_chunk_size(max_chunk_size)
    }

    pub fn set_min_similarity(&self, min_similarity: f32) -> Result<()> {
        self.assembler.set_min_similarity(min_similarity)
    }
}
