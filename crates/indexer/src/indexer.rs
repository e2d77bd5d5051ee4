use crate::error::{IndexerError, Result};
use crate::ignore_filter::IgnoreFilter;
use crate::scanner::{relative_key, FileScanner, ScanOptions};
use crate::stats::IndexStats;
use context_index_store::{Embedding, EmbeddingProvider, FileIndexEntry, IndexStore};
use context_symbols::{try_extract, Language};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Instant, SystemTime};
use tokio_util::sync::CancellationToken;

/// Files processed concurrently per batch when the caller has no preference
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Reported once per finished batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexProgress {
    /// Zero-based index of the batch that just finished
    pub batch_index: usize,
    /// Files handled so far, cumulative across batches
    pub processed: usize,
    pub total: usize,
}

/// Progress callback; invoked on the scanning task between batches
pub type ProgressFn<'a> = dyn Fn(IndexProgress) + Send + Sync + 'a;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    Completed(IndexStats),
    /// Another full scan was in flight; nothing was done
    AlreadyRunning,
    /// Stopped at a batch boundary; entries written so far are kept
    Cancelled(IndexStats),
}

impl IndexOutcome {
    pub fn stats(&self) -> Option<&IndexStats> {
        match self {
            Self::Completed(stats) | Self::Cancelled(stats) => Some(stats),
            Self::AlreadyRunning => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachOutcome {
    /// Entry replaced with freshly extracted and embedded data
    Indexed,
    /// File no longer exists; its entry (if any) was dropped
    Removed,
    /// File is filtered out; its entry (if any) was dropped
    Excluded,
    /// A full scan is running and will pick the file up
    SkippedScanInProgress,
}

struct WorkspaceRoot {
    path: PathBuf,
    name: String,
    filter: Arc<IgnoreFilter>,
}

#[derive(Clone)]
struct Candidate {
    abs: PathBuf,
    key: String,
}

struct ResolvedPath {
    root: usize,
    abs: PathBuf,
    relative: String,
}

/// Resets the busy flag when the scan ends, including on early return or panic
struct ScanGuard<'a>(&'a AtomicBool);

impl<'a> ScanGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct BuiltEntry {
    entry: FileIndexEntry,
    parse_failed: bool,
    embedding_failed: bool,
}

/// Drives read → extract → embed → store over one or more workspace roots.
///
/// At most one full scan runs at a time. Keys are root-relative; with more
/// than one root they are prefixed by the root's directory name.
pub struct WorkspaceIndexer {
    roots: Vec<WorkspaceRoot>,
    store: Arc<IndexStore>,
    provider: Arc<dyn EmbeddingProvider>,
    scan_options: ScanOptions,
    busy: AtomicBool,
    cancel: Mutex<CancellationToken>,
}

impl WorkspaceIndexer {
    pub fn new(
        roots: Vec<PathBuf>,
        store: Arc<IndexStore>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        Self::with_options(roots, store, provider, ScanOptions::default())
    }

    pub fn with_options(
        roots: Vec<PathBuf>,
        store: Arc<IndexStore>,
        provider: Arc<dyn EmbeddingProvider>,
        scan_options: ScanOptions,
    ) -> Result<Self> {
        if roots.is_empty() {
            return Err(IndexerError::InvalidPath(
                "at least one workspace root is required".to_string(),
            ));
        }

        let mut loaded: Vec<WorkspaceRoot> = Vec::with_capacity(roots.len());
        for root in roots {
            if !root.is_dir() {
                return Err(IndexerError::InvalidPath(format!(
                    "Path does not exist or is not a directory: {}",
                    root.display()
                )));
            }
            let path = root.canonicalize()?;
            let base = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "root".to_string());
            let name = if loaded.iter().any(|r| r.name == base) {
                format!("{base}-{}", loaded.len())
            } else {
                base
            };
            let filter = Arc::new(IgnoreFilter::load_with(&path, scan_options.respect_gitignore)?);
            loaded.push(WorkspaceRoot { path, name, filter });
        }

        Ok(Self {
            roots: loaded,
            store,
            provider,
            scan_options,
            busy: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
        })
    }

    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Canonical workspace roots
    pub fn roots(&self) -> Vec<&Path> {
        self.roots.iter().map(|r| r.path.as_path()).collect()
    }

    pub fn is_indexing(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Stop the scan in flight at its next batch boundary
    pub fn cancel_scan(&self) {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    fn fresh_token(&self) -> CancellationToken {
        let mut guard = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = CancellationToken::new();
        guard.clone()
    }

    /// Full scan of every root in batches of `batch_size`.
    ///
    /// Files inside a batch run concurrently; the next batch starts only when
    /// the whole batch has finished. One failing file never fails the scan.
    pub async fn index_workspace(
        &self,
        batch_size: usize,
        on_progress: Option<&ProgressFn<'_>>,
    ) -> Result<IndexOutcome> {
        if batch_size == 0 {
            return Err(IndexerError::InvalidConfig(
                "batch size must be greater than 0".to_string(),
            ));
        }
        let Some(_guard) = ScanGuard::acquire(&self.busy) else {
            log::info!("Workspace scan already in progress; ignoring request");
            return Ok(IndexOutcome::AlreadyRunning);
        };
        let token = self.fresh_token();

        let start = Instant::now();
        let mut stats = IndexStats::new();

        // 1. Candidate list, built once so batch sizing and totals are exact
        let candidates = self.collect_candidates();
        let total = candidates.len();
        log::info!(
            "Indexing {total} files in batches of {batch_size} ({} roots)",
            self.roots.len()
        );

        // 2. Batches with a barrier between them
        let mut processed = 0usize;
        for (batch_index, batch) in candidates.chunks(batch_size).enumerate() {
            if token.is_cancelled() {
                stats.time_ms = elapsed_ms(start);
                log::info!("Workspace scan cancelled after {processed}/{total} files");
                return Ok(IndexOutcome::Cancelled(stats));
            }

            let mut tasks = Vec::with_capacity(batch.len());
            for candidate in batch {
                let candidate = candidate.clone();
                let provider = Arc::clone(&self.provider);
                let key = candidate.key.clone();
                let handle = tokio::spawn(async move {
                    build_entry(candidate.abs, candidate.key, provider).await
                });
                tasks.push((key, handle));
            }

            for (key, task) in tasks {
                match task.await {
                    Ok(Ok(built)) => self.commit(built, &mut stats),
                    Ok(Err(e)) => {
                        // Unreadable now: whatever was indexed before is stale
                        self.store.remove(&key);
                        log::warn!("Skipping file: {e}");
                        stats.add_error(e);
                    }
                    Err(e) => {
                        log::warn!("Indexing task failed: {e}");
                        stats.add_error(format!("Task panicked: {e}"));
                    }
                }
            }

            processed += batch.len();
            if let Some(callback) = on_progress {
                callback(IndexProgress {
                    batch_index,
                    processed,
                    total,
                });
            }
            tokio::task::yield_now().await;
        }

        // 3. Forget files that vanished since the last scan
        let live: HashSet<String> = candidates.into_iter().map(|c| c.key).collect();
        stats.purged = self.store.purge_missing(&live);
        stats.time_ms = elapsed_ms(start);

        log::info!(
            "Indexed {} files ({} symbols, {} parse failures, {} embedding failures, {} skipped) in {} ms",
            stats.files,
            stats.symbols,
            stats.parse_failures,
            stats.embedding_failures,
            stats.errors.len(),
            stats.time_ms
        );
        Ok(IndexOutcome::Completed(stats))
    }

    /// Re-index one file (on-save hook). Skipped while a full scan runs.
    pub async fn attach_file(&self, path: impl AsRef<Path>) -> Result<AttachOutcome> {
        let path = path.as_ref();
        if self.is_indexing() {
            log::warn!(
                "Skipping update of {} while a workspace scan is in progress",
                path.display()
            );
            return Ok(AttachOutcome::SkippedScanInProgress);
        }

        let resolved = self.resolve(path).ok_or_else(|| {
            IndexerError::InvalidPath(format!("{} is outside the workspace", path.display()))
        })?;
        let key = self.key_for(resolved.root, &resolved.relative);

        let meta = match tokio::fs::metadata(&resolved.abs).await {
            Ok(meta) => meta,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                self.store.remove(&key);
                log::debug!("{key} no longer exists; dropped from index");
                return Ok(AttachOutcome::Removed);
            }
            Err(err) => return Err(err.into()),
        };

        let filter = &self.roots[resolved.root].filter;
        if !meta.is_file()
            || filter.is_ignored(&resolved.relative)
            || meta.len() > self.scan_options.max_file_size
        {
            self.store.remove(&key);
            return Ok(AttachOutcome::Excluded);
        }

        let built =
            match build_entry(resolved.abs, key.clone(), Arc::clone(&self.provider)).await {
                Ok(built) => built,
                Err(err) => {
                    self.store.remove(&key);
                    return Err(IndexerError::Other(err));
                }
            };
        let mut stats = IndexStats::new();
        self.commit(built, &mut stats);
        Ok(AttachOutcome::Indexed)
    }

    /// Drop the entry for a deleted file. Returns whether one existed.
    pub fn remove_file(&self, path: impl AsRef<Path>) -> bool {
        let Some(resolved) = self.resolve(path.as_ref()) else {
            return false;
        };
        let key = self.key_for(resolved.root, &resolved.relative);
        self.store.remove(&key).is_some()
    }

    /// Index key for a workspace path, if it lies under a root
    pub fn key_of(&self, path: impl AsRef<Path>) -> Option<String> {
        self.resolve(path.as_ref())
            .map(|resolved| self.key_for(resolved.root, &resolved.relative))
    }

    fn commit(&self, built: BuiltEntry, stats: &mut IndexStats) {
        if built.parse_failed {
            stats.add_parse_failure();
        }
        if built.embedding_failed {
            stats.add_embedding_failure();
        }
        stats.add_file(&built.entry.language, built.entry.symbols.len());
        self.store.put(built.entry);
    }

    fn collect_candidates(&self) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for (idx, root) in self.roots.iter().enumerate() {
            let scanner =
                FileScanner::new(&root.path, Arc::clone(&root.filter), self.scan_options.clone());
            for abs in scanner.scan() {
                let key = self.key_for(idx, &relative_key(&root.path, &abs));
                candidates.push(Candidate { abs, key });
            }
        }
        candidates
    }

    fn key_for(&self, root: usize, relative: &str) -> String {
        if self.roots.len() > 1 {
            format!("{}/{relative}", self.roots[root].name)
        } else {
            relative.to_string()
        }
    }

    fn resolve(&self, path: &Path) -> Option<ResolvedPath> {
        if path.is_absolute() {
            let abs = canonical_or_lexical(path);
            return self.roots.iter().enumerate().find_map(|(idx, root)| {
                abs.strip_prefix(&root.path).ok().map(|_| ResolvedPath {
                    root: idx,
                    relative: relative_key(&root.path, &abs),
                    abs: abs.clone(),
                })
            });
        }

        if path
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return None;
        }

        let (root, relative) = if self.roots.len() == 1 {
            (0, path.to_path_buf())
        } else {
            let mut components = path.components();
            let first = components.next()?.as_os_str().to_string_lossy().into_owned();
            let idx = self.roots.iter().position(|r| r.name == first)?;
            (idx, components.as_path().to_path_buf())
        };
        let abs = self.roots[root].path.join(&relative);
        Some(ResolvedPath {
            root,
            relative: relative_key(&self.roots[root].path, &abs),
            abs,
        })
    }
}

/// Canonicalize, falling back to the canonical parent for deleted files
fn canonical_or_lexical(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Per-file pipeline. Read errors skip the file; parse and embedding
/// failures still produce an entry.
async fn build_entry(
    abs: PathBuf,
    key: String,
    provider: Arc<dyn EmbeddingProvider>,
) -> std::result::Result<BuiltEntry, String> {
    let content = tokio::fs::read_to_string(&abs)
        .await
        .map_err(|e| format!("{}: {e}", abs.display()))?;
    let last_modified = tokio::fs::metadata(&abs)
        .await
        .and_then(|meta| meta.modified())
        .unwrap_or_else(|_| SystemTime::now());

    let (key, content, extracted) = tokio::task::spawn_blocking(move || {
        let extracted = try_extract(&key, &content);
        (key, content, extracted)
    })
    .await
    .map_err(|e| format!("{}: extraction task failed: {e}", abs.display()))?;

    let (extraction, parse_failed) = match extracted {
        Ok(extraction) => (extraction, false),
        Err(err) => {
            log::debug!("{key}: {err}; storing without symbols");
            (Default::default(), true)
        }
    };

    let (embedding, embedding_failed) = match provider.embed_tagged(&content).await {
        Ok(embedding) => (embedding, false),
        Err(err) => {
            log::warn!("Embedding failed for {key}: {err}; storing zero vector");
            (
                Embedding::zero(provider.model_id(), provider.dimension()),
                true,
            )
        }
    };

    log::debug!(
        "Indexed {key}: {} symbols, {} imports",
        extraction.symbols.len(),
        extraction.imports.len()
    );

    Ok(BuiltEntry {
        entry: FileIndexEntry {
            language: Language::from_path(&key).as_str().to_string(),
            path: key,
            content,
            symbols: extraction.symbols,
            imports: extraction.imports,
            embedding,
            last_modified,
        },
        parse_failed,
        embedding_failed,
    })
}
