//! History recording for qplay
//!
//! The coordinator never talks to the store directly. It pushes
//! [`ApplyEvent`]s into a [`HistorySink`]; a [`HistoryRecorder`] task drains
//! them in order, performs the inserts on the blocking pool and broadcasts
//! what changed to anyone rendering the history list.

use crate::error::{Error, Result};
use crate::store::{HistoryEntry, StoreHandle};
use crate::types::HistoryKind;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Capacity of the change broadcast; slow subscribers see `Lagged`
const EVENT_BUFFER: usize = 64;

/// Emitted by the coordinator after a successful apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyEvent {
    Applied { kind: HistoryKind, content: String },
}

/// Published by the recorder after the store changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEvent {
    Recorded {
        kind: HistoryKind,
        entry: HistoryEntry,
        evicted: Option<HistoryEntry>,
    },
}

/// Sending half handed to the coordinator
#[derive(Debug, Clone)]
pub struct HistorySink {
    tx: mpsc::UnboundedSender<ApplyEvent>,
}

impl HistorySink {
    pub fn new(tx: mpsc::UnboundedSender<ApplyEvent>) -> Self {
        Self { tx }
    }

    /// Queue `content` for recording without waiting for the store
    pub fn record(&self, kind: HistoryKind, content: String) -> Result<()> {
        self.tx
            .send(ApplyEvent::Applied { kind, content })
            .map_err(|_| Error::custom("history recorder stopped"))
    }
}

/// Background task that writes applied queries into the store
pub struct HistoryRecorder {
    task: JoinHandle<()>,
    events: broadcast::Sender<HistoryEvent>,
}

impl HistoryRecorder {
    /// Start recording into `store`. Must be called inside a tokio runtime.
    pub fn spawn(store: StoreHandle) -> (Self, HistorySink) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let task = tokio::spawn(run(store, rx, events.clone()));

        (Self { task, events }, HistorySink::new(tx))
    }

    /// Receive store changes made by this recorder
    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.events.subscribe()
    }

    /// Wait until every sink is dropped and all queued events are written
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "history recorder task failed");
        }
    }
}

async fn run(
    store: StoreHandle,
    mut rx: mpsc::UnboundedReceiver<ApplyEvent>,
    events: broadcast::Sender<HistoryEvent>,
) {
    while let Some(ApplyEvent::Applied { kind, content }) = rx.recv().await {
        let handle = store.clone();
        let inserted =
            tokio::task::spawn_blocking(move || handle.insert(kind, &content)).await;

        match inserted {
            Ok(Ok(Some(insertion))) => {
                debug!(%kind, id = %insertion.inserted.id, "recorded history entry");
                // No subscribers is fine.
                let _ = events.send(HistoryEvent::Recorded {
                    kind,
                    entry: insertion.inserted,
                    evicted: insertion.evicted,
                });
            }
            Ok(Ok(None)) => trace!(%kind, "history entry skipped"),
            Ok(Err(e)) => warn!(%kind, error = %e, "failed to record history entry"),
            Err(e) => warn!(%kind, error = %e, "history insert task failed"),
        }
    }
    debug!("history recorder stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{HistoryStore, PageRequest, StoreLimits};
    use tempfile::TempDir;

    fn memory_store(max_entries: usize) -> StoreHandle {
        StoreHandle::from_store(
            HistoryStore::open_in_memory(StoreLimits {
                max_entries,
                max_entry_size: 100,
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_records_in_order() {
        let store = memory_store(10);
        let (recorder, sink) = HistoryRecorder::spawn(store.clone());

        for content in ["a", "b", "b", "c"] {
            sink.record(HistoryKind::Queries, content.to_string()).unwrap();
        }
        drop(sink);
        recorder.join().await;

        let page = store.query(HistoryKind::Queries, &PageRequest::new()).unwrap();
        let contents: Vec<_> = page.items.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_broadcasts_insertions_and_evictions() {
        let store = memory_store(1);
        let (recorder, sink) = HistoryRecorder::spawn(store);
        let mut changes = recorder.subscribe();

        sink.record(HistoryKind::Queries, "first".to_string()).unwrap();
        sink.record(HistoryKind::Queries, "second".to_string()).unwrap();

        let HistoryEvent::Recorded { entry, evicted, .. } = changes.recv().await.unwrap();
        assert_eq!(entry.content, "first");
        assert_eq!(evicted, None);

        let HistoryEvent::Recorded { entry, evicted, .. } = changes.recv().await.unwrap();
        assert_eq!(entry.content, "second");
        assert_eq!(evicted.unwrap().content, "first");

        drop(sink);
        recorder.join().await;
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        let temp_dir = TempDir::new().unwrap();
        let blocked = temp_dir.path().join("blocked");
        std::fs::create_dir(&blocked).unwrap();
        let store = StoreHandle::new(&blocked, StoreLimits::default());

        let (recorder, sink) = HistoryRecorder::spawn(store);
        sink.record(HistoryKind::Queries, "a".to_string()).unwrap();
        drop(sink);
        // Completes without panicking.
        recorder.join().await;
    }

    #[tokio::test]
    async fn test_sink_reports_stopped_recorder() {
        let (recorder, sink) = HistoryRecorder::spawn(memory_store(10));
        recorder.task.abort();
        let _ = recorder.task.await;
        assert!(sink.record(HistoryKind::Queries, "a".to_string()).is_err());
    }
}
