use crate::indexer::{AttachOutcome, WorkspaceIndexer};
use crate::{IndexerError, Result};
use log::{debug, info, warn};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub struct WatcherConfig {
    /// Quiet period after the last event before changed files are attached
    pub debounce: Duration,
    /// Upper bound on how long the first pending change can wait
    pub max_batch_wait: Duration,
    pub notify_poll_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            max_batch_wait: Duration::from_secs(2),
            notify_poll_interval: Duration::from_secs(2),
        }
    }
}

/// Result of re-attaching one changed file
#[derive(Debug, Clone)]
pub struct WatchUpdate {
    pub path: PathBuf,
    pub outcome: std::result::Result<AttachOutcome, String>,
}

/// Keeps the index in sync with file saves and deletions under every root.
///
/// Cloning shares the same watcher; it shuts down when the last clone drops.
#[derive(Clone)]
pub struct WorkspaceWatcher {
    inner: Arc<WatcherInner>,
}

struct WatcherInner {
    update_tx: broadcast::Sender<WatchUpdate>,
    shutdown: CancellationToken,
    watch_count: usize,
    _watcher: std::sync::Mutex<RecommendedWatcher>,
}

impl WorkspaceWatcher {
    /// Must be called from inside a tokio runtime
    pub fn start(indexer: Arc<WorkspaceIndexer>, config: WatcherConfig) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::channel(1024);
        let (update_tx, _) = broadcast::channel(64);
        let shutdown = CancellationToken::new();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = event_tx.blocking_send(res);
            },
            NotifyConfig::default().with_poll_interval(config.notify_poll_interval),
        )
        .map_err(|e| IndexerError::Other(format!("watcher init failed: {e}")))?;

        let mut watch_count = 0;
        for root in indexer.roots() {
            match watcher.watch(root, RecursiveMode::Recursive) {
                Ok(()) => watch_count += 1,
                Err(err) => warn!("failed to watch {}: {err}", root.display()),
            }
        }
        info!("Watching {watch_count} workspace roots");

        tokio::spawn(run_watch_loop(
            indexer,
            DebounceState::new(config.debounce, config.max_batch_wait),
            event_rx,
            update_tx.clone(),
            shutdown.clone(),
        ));

        Ok(Self {
            inner: Arc::new(WatcherInner {
                update_tx,
                shutdown,
                watch_count,
                _watcher: std::sync::Mutex::new(watcher),
            }),
        })
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WatchUpdate> {
        self.inner.update_tx.subscribe()
    }

    /// Roots the backend accepted
    #[must_use]
    pub fn watch_count(&self) -> usize {
        self.inner.watch_count
    }

    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }
}

impl Drop for WorkspaceWatcher {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            self.inner.shutdown.cancel();
        }
    }
}

/// Pending paths plus the instant they should be flushed
struct DebounceState {
    debounce: Duration,
    max_batch: Duration,
    pending: HashSet<PathBuf>,
    first_event: Option<Instant>,
    last_event: Option<Instant>,
}

impl DebounceState {
    fn new(debounce: Duration, max_batch: Duration) -> Self {
        Self {
            debounce,
            max_batch,
            pending: HashSet::new(),
            first_event: None,
            last_event: None,
        }
    }

    fn record(&mut self, event: Event, now: Instant) {
        if matches!(event.kind, EventKind::Access(_)) || event.paths.is_empty() {
            return;
        }
        self.pending.extend(event.paths);
        self.first_event.get_or_insert(now);
        self.last_event = Some(now);
    }

    /// `debounce` after the last event, but never later than `max_batch`
    /// after the first one
    fn next_deadline(&self) -> Option<Instant> {
        if self.pending.is_empty() {
            return None;
        }
        let quiet = self.last_event.map(|last| last + self.debounce)?;
        Some(match self.first_event {
            Some(first) => quiet.min(first + self.max_batch),
            None => quiet,
        })
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.first_event = None;
        self.last_event = None;
        let mut paths: Vec<PathBuf> = self.pending.drain().collect();
        paths.sort();
        paths
    }
}

async fn run_watch_loop(
    indexer: Arc<WorkspaceIndexer>,
    mut state: DebounceState,
    mut events: mpsc::Receiver<notify::Result<Event>>,
    update_tx: broadcast::Sender<WatchUpdate>,
    shutdown: CancellationToken,
) {
    loop {
        let next_deadline = state.next_deadline();

        tokio::select! {
            () = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Some(Ok(event)) => state.record(event, Instant::now()),
                Some(Err(err)) => warn!("watch error: {err}"),
                None => break,
            },
            () = async {
                if let Some(deadline) = next_deadline {
                    time::sleep_until(deadline).await;
                }
            }, if next_deadline.is_some() => {
                flush(&indexer, state.take(), &update_tx).await;
            }
        }
    }
    debug!("Workspace watcher stopped");
}

async fn flush(
    indexer: &WorkspaceIndexer,
    paths: Vec<PathBuf>,
    update_tx: &broadcast::Sender<WatchUpdate>,
) {
    for path in paths {
        if path.is_dir() || indexer.key_of(&path).is_none() {
            continue;
        }
        let outcome = indexer.attach_file(&path).await.map_err(|e| e.to_string());
        match &outcome {
            Ok(AttachOutcome::Excluded) => {}
            Ok(outcome) => debug!("{}: {outcome:?}", path.display()),
            Err(err) => warn!("Failed to update {}: {err}", path.display()),
        }
        let _ = update_tx.send(WatchUpdate { path, outcome });
    }
}
