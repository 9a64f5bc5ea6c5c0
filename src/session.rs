//! Playground session wiring
//!
//! A [`Session`] is the explicit context object that owns one store handle,
//! one evaluator worker, one history recorder and one coordinator. Front ends
//! create a session from configuration instead of reaching for globals.

use crate::config::Config;
use crate::coordinator::{ApplyCoordinator, ApplySettings};
use crate::error::Result;
use crate::evaluator::{Evaluator, EvaluatorClient};
use crate::history::{HistoryEvent, HistoryRecorder};
use crate::store::{StoreHandle, StoreLimits};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

pub struct Session {
    coordinator: ApplyCoordinator,
    recorder: HistoryRecorder,
    store: StoreHandle,
}

impl Session {
    /// Build a session from configuration. Must be called inside a tokio runtime.
    ///
    /// The store is opened lazily, so an unusable database does not prevent
    /// applying queries; only history operations fail.
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;

        let store = StoreHandle::new(&config.store.path, StoreLimits::from(&config.store));
        let evaluator = EvaluatorClient::from_config(&config.evaluator)?;
        info!(
            store = %config.store.path.display(),
            engine = ?config.evaluator.engine,
            "opening playground session"
        );

        Ok(Self::with_parts(
            store,
            Arc::new(evaluator),
            ApplySettings::from(&config.apply),
        ))
    }

    /// Build a session from already constructed parts
    pub fn with_parts(
        store: StoreHandle,
        evaluator: Arc<dyn Evaluator>,
        settings: ApplySettings,
    ) -> Self {
        let (recorder, sink) = HistoryRecorder::spawn(store.clone());
        let coordinator = ApplyCoordinator::new(evaluator, settings).with_history(sink);
        Self {
            coordinator,
            recorder,
            store,
        }
    }

    pub fn coordinator(&self) -> &ApplyCoordinator {
        &self.coordinator
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn recorder(&self) -> &HistoryRecorder {
        &self.recorder
    }

    /// Shortcut for [`HistoryRecorder::subscribe`]
    pub fn history_events(&self) -> broadcast::Receiver<HistoryEvent> {
        self.recorder.subscribe()
    }

    /// Flush pending history writes and close the store
    pub async fn close(self) -> Result<()> {
        let Self {
            coordinator,
            recorder,
            store,
        } = self;

        coordinator.cancel_pending();
        drop(coordinator);
        recorder.join().await;
        store.close()?;
        debug!("playground session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::ApplyOutcome;
    use crate::store::PageRequest;
    use crate::types::{DocumentKind, HistoryKind, TypedDocument};
    use tempfile::TempDir;

    fn config(temp_dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.store.path = temp_dir.path().join("history.db");
        config.apply.auto_apply = false;
        config
    }

    #[tokio::test]
    async fn test_apply_records_history() {
        let temp_dir = TempDir::new().unwrap();
        let config = config(&temp_dir);
        let session = Session::open(&config).unwrap();

        session.coordinator().set_input(r#"{"a":1}"#, DocumentKind::Json);
        session.coordinator().set_query("a", DocumentKind::Query);
        let outcome = session.coordinator().apply().await;
        assert_eq!(outcome, ApplyOutcome::Applied(TypedDocument::json("1")));

        let store = session.store().clone();
        session.close().await.unwrap();

        store.reconnect().unwrap();
        let page = store.query(HistoryKind::Queries, &PageRequest::new()).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].content, "a");
    }

    #[tokio::test]
    async fn test_history_events_follow_applies() {
        let temp_dir = TempDir::new().unwrap();
        let session = Session::open(&config(&temp_dir)).unwrap();
        let mut events = session.history_events();

        session.coordinator().set_input("{}", DocumentKind::Json);
        session.coordinator().set_query(".", DocumentKind::Query);
        session.coordinator().apply().await;

        let HistoryEvent::Recorded { kind, entry, .. } = events.recv().await.unwrap();
        assert_eq!(kind, HistoryKind::Queries);
        assert_eq!(entry.content, ".");
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config(&temp_dir);
        config.store.max_entries = 0;
        assert!(Session::open(&config).is_err());
    }

    #[tokio::test]
    async fn test_unusable_store_does_not_block_apply() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config(&temp_dir);
        // A directory cannot be opened as a database.
        config.store.path = temp_dir.path().to_path_buf();
        let session = Session::open(&config).unwrap();

        session.coordinator().set_input(r#"{"a":1}"#, DocumentKind::Json);
        session.coordinator().set_query("a", DocumentKind::Query);
        let outcome = session.coordinator().apply().await;
        assert_eq!(outcome, ApplyOutcome::Applied(TypedDocument::json("1")));
        assert!(session.store().count(HistoryKind::Queries).is_err());
        session.close().await.unwrap();
    }
}
