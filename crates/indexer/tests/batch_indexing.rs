use async_trait::async_trait;
use context_index_store::{EmbeddingProvider, IndexStore, IndexStoreError, StubEmbedder};
use context_indexer::{AttachOutcome, IndexOutcome, IndexProgress, WorkspaceIndexer};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Fails for any text containing `FAIL_EMBED`
struct FlakyEmbedder(StubEmbedder);

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    async fn embed(&self, text: &str) -> context_index_store::Result<Vec<f32>> {
        if text.contains("FAIL_EMBED") {
            return Err(IndexStoreError::EmbeddingError("provider unavailable".into()));
        }
        self.0.embed(text).await
    }

    fn model_id(&self) -> &str {
        self.0.model_id()
    }

    fn dimension(&self) -> usize {
        self.0.dimension()
    }
}

struct SlowEmbedder(StubEmbedder);

#[async_trait]
impl EmbeddingProvider for SlowEmbedder {
    async fn embed(&self, text: &str) -> context_index_store::Result<Vec<f32>> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.0.embed(text).await
    }

    fn model_id(&self) -> &str {
        self.0.model_id()
    }

    fn dimension(&self) -> usize {
        self.0.dimension()
    }
}

fn write(root: &Path, rel: &str, content: impl AsRef<[u8]>) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn indexer_with(root: &Path, provider: Arc<dyn EmbeddingProvider>) -> WorkspaceIndexer {
    WorkspaceIndexer::new(vec![root.to_path_buf()], Arc::new(IndexStore::new()), provider)
        .unwrap()
}

fn stub_indexer(root: &Path) -> WorkspaceIndexer {
    indexer_with(root, Arc::new(StubEmbedder::new(32)))
}

#[tokio::test]
async fn progress_is_reported_once_per_batch() {
    let temp = TempDir::new().unwrap();
    for i in 0..25 {
        write(
            temp.path(),
            &format!("src/mod_{i:02}.ts"),
            format!("export function f{i}() {{ return {i}; }}\n"),
        );
    }
    let indexer = stub_indexer(temp.path());

    let seen = Mutex::new(Vec::new());
    let record = |progress: IndexProgress| seen.lock().unwrap().push(progress);
    let outcome = indexer.index_workspace(10, Some(&record)).await.unwrap();

    let seen = seen.into_inner().unwrap();
    let processed: Vec<usize> = seen.iter().map(|p| p.processed).collect();
    assert_eq!(processed, vec![10, 20, 25]);
    assert!(seen.iter().all(|p| p.total == 25));
    assert_eq!(
        seen.iter().map(|p| p.batch_index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );

    let IndexOutcome::Completed(stats) = outcome else {
        panic!("expected completed scan, got {outcome:?}");
    };
    assert_eq!(stats.files, 25);
    assert_eq!(stats.symbols, 25);
    assert_eq!(indexer.store().len(), 25);
    assert_eq!(indexer.store().find_by_name("f7")[0].file_path, "src/mod_07.ts");
}

#[tokio::test]
async fn excluded_files_never_reach_the_store() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/app.ts", "export const app = 1;\n");
    write(temp.path(), "node_modules/lib/index.js", "module.exports = 1;\n");
    write(temp.path(), "generated/api.ts", "export const api = 1;\n");
    write(temp.path(), "assets/logo.png", [0x89, 0x50, 0x4e, 0x47]);
    write(temp.path(), ".contextignore", "generated/\n");
    let indexer = stub_indexer(temp.path());

    let outcome = indexer.index_workspace(4, None).await.unwrap();

    assert_eq!(outcome.stats().map(|s| s.files), Some(1));
    assert_eq!(indexer.store().paths(), vec!["src/app.ts".to_string()]);
}

#[tokio::test]
async fn gitignore_decides_scan_and_attach_alike() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join(".git")).unwrap();
    write(temp.path(), ".gitignore", "local.ts\n");
    write(temp.path(), "app.ts", "export const app = 1;\n");
    write(temp.path(), "local.ts", "export const local = 1;\n");
    let indexer = stub_indexer(temp.path());

    indexer.index_workspace(10, None).await.unwrap();
    assert_eq!(indexer.store().paths(), vec!["app.ts".to_string()]);

    assert_eq!(
        indexer.attach_file("local.ts").await.unwrap(),
        AttachOutcome::Excluded
    );
    let rescan = indexer.index_workspace(10, None).await.unwrap();
    assert_eq!(rescan.stats().map(|s| s.purged), Some(0));
    assert_eq!(indexer.store().paths(), vec!["app.ts".to_string()]);
}

#[tokio::test]
async fn one_bad_file_does_not_fail_the_scan() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "ok.ts", "export function ok() {}\n");
    write(temp.path(), "broken.ts", "export class {{{ = ;\n");
    write(temp.path(), "embed.py", "def flaky():\n    return 'FAIL_EMBED'\n");
    write(temp.path(), "latin1.ts", [0x66, 0xff, 0xfe, 0x00, 0x3b]);
    let provider = Arc::new(FlakyEmbedder(StubEmbedder::new(32)));
    let indexer = indexer_with(temp.path(), provider);

    let outcome = indexer.index_workspace(8, None).await.unwrap();
    let stats = outcome.stats().unwrap();

    assert_eq!(stats.files, 3);
    assert_eq!(stats.parse_failures, 1);
    assert_eq!(stats.embedding_failures, 1);
    assert_eq!(stats.errors.len(), 1);

    let broken = indexer.store().get("broken.ts").unwrap();
    assert!(broken.symbols.is_empty());
    assert!(!broken.embedding.is_zero());

    let flaky = indexer.store().get("embed.py").unwrap();
    assert_eq!(flaky.symbols[0].name, "flaky");
    assert!(flaky.embedding.is_zero());
    assert_eq!(flaky.embedding.model_id, "stub-32");
    assert_eq!(flaky.embedding.dimension(), 32);

    assert!(!indexer.store().contains("latin1.ts"));
}

#[tokio::test]
async fn rescan_purges_deleted_files() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "keep.rs", "fn keep() {}\n");
    write(temp.path(), "gone.rs", "fn gone() {}\n");
    let indexer = stub_indexer(temp.path());
    indexer.index_workspace(10, None).await.unwrap();
    assert_eq!(indexer.store().len(), 2);

    std::fs::remove_file(temp.path().join("gone.rs")).unwrap();
    let outcome = indexer.index_workspace(10, None).await.unwrap();

    assert_eq!(outcome.stats().map(|s| s.purged), Some(1));
    assert_eq!(indexer.store().paths(), vec!["keep.rs".to_string()]);
    assert!(indexer.store().find_by_name("gone").is_empty());
}

#[tokio::test]
async fn unreadable_file_drops_its_previous_entry() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.ts", "export function oldName() {}\n");
    write(temp.path(), "b.ts", "export function other() {}\n");
    let indexer = stub_indexer(temp.path());
    indexer.index_workspace(10, None).await.unwrap();
    assert_eq!(indexer.store().find_by_name("oldName").len(), 1);

    write(temp.path(), "a.ts", [0x66, 0xff, 0xfe, 0x00]);
    let outcome = indexer.index_workspace(10, None).await.unwrap();

    let stats = outcome.stats().unwrap();
    assert_eq!(stats.errors.len(), 1);
    assert!(!indexer.store().contains("a.ts"));
    assert!(indexer.store().find_by_name("oldName").is_empty());
    assert_eq!(indexer.store().paths(), vec!["b.ts".to_string()]);

    // Same for the single-file path
    write(temp.path(), "b.ts", [0x66, 0xff, 0xfe, 0x00]);
    assert!(indexer.attach_file("b.ts").await.is_err());
    assert!(indexer.store().is_empty());
    assert!(indexer.store().find_by_name("other").is_empty());
}

#[tokio::test]
async fn attach_is_idempotent() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/util.ts", "export function add(a, b) { return a + b; }\n");
    let indexer = stub_indexer(temp.path());

    assert_eq!(
        indexer.attach_file("src/util.ts").await.unwrap(),
        AttachOutcome::Indexed
    );
    let first = indexer.store().get("src/util.ts").unwrap();
    assert_eq!(
        indexer.attach_file("src/util.ts").await.unwrap(),
        AttachOutcome::Indexed
    );
    let second = indexer.store().get("src/util.ts").unwrap();

    assert_eq!(indexer.store().len(), 1);
    assert_eq!(first.symbols, second.symbols);
    assert_eq!(first.embedding, second.embedding);
    assert_eq!(indexer.store().find_by_name("add").len(), 1);
}

#[tokio::test]
async fn overlapping_scan_and_attach_are_skipped() {
    let temp = TempDir::new().unwrap();
    for i in 0..4 {
        write(temp.path(), &format!("f{i}.py"), format!("def f{i}():\n    pass\n"));
    }
    let provider = Arc::new(SlowEmbedder(StubEmbedder::new(8)));
    let indexer = Arc::new(indexer_with(temp.path(), provider));

    let first = tokio::spawn({
        let indexer = Arc::clone(&indexer);
        async move { indexer.index_workspace(1, None).await }
    });

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !indexer.is_indexing() {
        assert!(tokio::time::Instant::now() < deadline, "scan never started");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(
        indexer.index_workspace(1, None).await.unwrap(),
        IndexOutcome::AlreadyRunning
    );
    assert_eq!(
        indexer.attach_file("f0.py").await.unwrap(),
        AttachOutcome::SkippedScanInProgress
    );

    let outcome = first.await.unwrap().unwrap();
    assert_eq!(outcome.stats().map(|s| s.files), Some(4));
    assert!(!indexer.is_indexing());
}

#[tokio::test]
async fn cancellation_stops_at_batch_boundary() {
    let temp = TempDir::new().unwrap();
    for i in 0..12 {
        write(temp.path(), &format!("m{i:02}.js"), format!("function m{i}() {{}}\n"));
    }
    let indexer = stub_indexer(temp.path());

    let cancel_after_first = |progress: IndexProgress| {
        if progress.batch_index == 0 {
            indexer.cancel_scan();
        }
    };
    let outcome = indexer
        .index_workspace(5, Some(&cancel_after_first))
        .await
        .unwrap();

    let IndexOutcome::Cancelled(stats) = outcome else {
        panic!("expected cancelled scan, got {outcome:?}");
    };
    assert_eq!(stats.files, 5);
    assert_eq!(indexer.store().len(), 5);
    assert!(!indexer.is_indexing());

    let rerun = indexer.index_workspace(5, None).await.unwrap();
    assert!(matches!(rerun, IndexOutcome::Completed(_)));
    assert_eq!(indexer.store().len(), 12);
}

#[tokio::test]
async fn multiple_roots_use_prefixed_keys() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    write(a.path(), "util.ts", "export function fromA() {}\n");
    write(b.path(), "util.ts", "export function fromB() {}\n");
    let indexer = WorkspaceIndexer::new(
        vec![a.path().to_path_buf(), b.path().to_path_buf()],
        Arc::new(IndexStore::new()),
        Arc::new(StubEmbedder::new(16)),
    )
    .unwrap();

    indexer.index_workspace(10, None).await.unwrap();

    let key_a = indexer.key_of(a.path().join("util.ts")).unwrap();
    let key_b = indexer.key_of(b.path().join("util.ts")).unwrap();
    assert_ne!(key_a, key_b);
    assert!(key_a.ends_with("/util.ts"));
    assert_eq!(indexer.store().find_by_name("fromA")[0].file_path, key_a);
    assert_eq!(indexer.store().find_by_name("fromB")[0].file_path, key_b);
}
