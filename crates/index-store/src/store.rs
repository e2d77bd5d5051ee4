use crate::similarity;
use crate::types::{Embedding, FileIndexEntry, SimilarFile};
use context_symbols::SymbolInfo;
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Inner {
    entries: HashMap<String, FileIndexEntry>,
    /// Derived view for exact-name lookups, kept in step with `entries`
    by_name: HashMap<String, Vec<SymbolInfo>>,
}

impl Inner {
    fn unlink_symbols(&mut self, entry: &FileIndexEntry) {
        for symbol in &entry.symbols {
            if let Some(list) = self.by_name.get_mut(&symbol.name) {
                list.retain(|s| s.file_path != entry.path);
                if list.is_empty() {
                    self.by_name.remove(&symbol.name);
                }
            }
        }
    }

    fn link_symbols(&mut self, entry: &FileIndexEntry) {
        for symbol in &entry.symbols {
            self.by_name
                .entry(symbol.name.clone())
                .or_default()
                .push(symbol.clone());
        }
    }
}

/// Authoritative in-memory map from workspace path to its indexed state.
///
/// Shared as `Arc<IndexStore>`; all mutation goes through `put`, `remove`,
/// `purge_missing` and `clear`.
#[derive(Default)]
pub struct IndexStore {
    inner: RwLock<Inner>,
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace by path. The previous entry is discarded wholesale.
    pub fn put(&self, entry: FileIndexEntry) -> Option<FileIndexEntry> {
        let mut inner = self.write();
        let previous = inner.entries.remove(&entry.path);
        if let Some(old) = &previous {
            inner.unlink_symbols(old);
        }
        inner.link_symbols(&entry);
        inner.entries.insert(entry.path.clone(), entry);
        previous
    }

    /// Remove the entry for `path`; no-op when absent.
    pub fn remove(&self, path: &str) -> Option<FileIndexEntry> {
        let mut inner = self.write();
        let removed = inner.entries.remove(path);
        if let Some(old) = &removed {
            inner.unlink_symbols(old);
        }
        removed
    }

    pub fn get(&self, path: &str) -> Option<FileIndexEntry> {
        self.read().entries.get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.read().entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }

    /// Indexed paths, sorted
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.read().entries.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn clear(&self) {
        let mut inner = self.write();
        inner.entries.clear();
        inner.by_name.clear();
    }

    /// Exact-name lookup across all files
    pub fn find_by_name(&self, name: &str) -> Vec<SymbolInfo> {
        self.read().by_name.get(name).cloned().unwrap_or_default()
    }

    /// Smallest symbol in `path` whose span contains `(line, ch)`.
    ///
    /// Ties on size go to the later-starting (more nested) symbol. An
    /// unindexed path yields `None`, same as a position outside any symbol.
    pub fn find_at_position(&self, path: &str, line: usize, ch: usize) -> Option<SymbolInfo> {
        let inner = self.read();
        let entry = inner.entries.get(path)?;
        entry
            .symbols
            .iter()
            .filter(|symbol| symbol.span.contains(line, ch))
            .min_by(|a, b| {
                a.span
                    .extent()
                    .cmp(&b.span.extent())
                    .then_with(|| b.span.start().cmp(&a.span.start()))
            })
            .cloned()
    }

    /// Rank stored embeddings against `query`; see [`similarity::cosine_similarity`].
    pub fn find_similar(
        &self,
        query: &Embedding,
        top_n: usize,
        min_similarity: f32,
    ) -> Vec<SimilarFile> {
        let inner = self.read();
        similarity::rank(query, inner.entries.values(), top_n, min_similarity)
    }

    /// Drop entries whose path is not in `live`. Returns how many were removed.
    pub fn purge_missing(&self, live: &HashSet<String>) -> usize {
        let mut inner = self.write();
        let stale: Vec<String> = inner
            .entries
            .keys()
            .filter(|path| !live.contains(*path))
            .cloned()
            .collect();
        for path in &stale {
            if let Some(old) = inner.entries.remove(path) {
                inner.unlink_symbols(&old);
            }
        }
        if !stale.is_empty() {
            log::debug!("Purged {} stale entries", stale.len());
        }
        stale.len()
    }

    /// Cloned copy of every entry, ordered by path
    pub fn entries_snapshot(&self) -> Vec<FileIndexEntry> {
        let inner = self.read();
        let mut entries: Vec<FileIndexEntry> = inner.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }
}
