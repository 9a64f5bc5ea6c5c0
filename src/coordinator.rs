//! Apply coordinator
//!
//! Owns the edit → evaluate → display cycle of one playground session:
//!
//! 1. Edits update the latest known input, query and output kind.
//! 2. With auto-apply enabled, each edit re-arms a [`Debouncer`]; when it
//!    fires, the inputs current at that moment are applied.
//! 3. At most one evaluation is in flight. An apply requested while another
//!    one is running is dropped, not queued.
//! 4. On success the output replaces the displayed one and the query text is
//!    handed to the history sink. On failure the error message is shown and
//!    history is left alone.
//! 5. When the evaluation deadline passes, the request is cancelled and the
//!    coordinator stays busy until the evaluator has let go of it, so a
//!    timed-out job never overlaps the next one.

use crate::config::ApplyConfig;
use crate::debounce::Debouncer;
use crate::error::Error;
use crate::evaluator::{EvalRequest, Evaluator};
use crate::history::HistorySink;
use crate::types::{DocumentKind, TypedDocument};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Settings that shape the coordinator's behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplySettings {
    pub auto_apply: bool,
    pub debounce: Duration,
    pub indent: usize,
    /// Evaluation deadline; `None` waits forever
    pub timeout: Option<Duration>,
}

impl Default for ApplySettings {
    fn default() -> Self {
        Self::from(&ApplyConfig::default())
    }
}

impl From<&ApplyConfig> for ApplySettings {
    fn from(config: &ApplyConfig) -> Self {
        Self {
            auto_apply: config.auto_apply,
            debounce: config.debounce(),
            indent: config.indent,
            timeout: config.eval_timeout(),
        }
    }
}

/// Coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyPhase {
    Idle,
    Applying,
}

/// What happened to an apply request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied(TypedDocument),
    Failed(String),
    /// Another evaluation was already in flight
    Dropped,
}

/// Everything a front end needs to render the current state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub output: Option<TypedDocument>,
    pub error: Option<String>,
    /// Human-readable description of the running operation
    pub loading: Option<String>,
}

#[derive(Debug, Clone)]
struct Inputs {
    input: TypedDocument,
    query: TypedDocument,
    output_type: DocumentKind,
}

impl Default for Inputs {
    fn default() -> Self {
        Self {
            input: TypedDocument::json(""),
            query: TypedDocument::new("", DocumentKind::Query),
            output_type: DocumentKind::Json,
        }
    }
}

struct Shared {
    evaluator: Arc<dyn Evaluator>,
    settings: ApplySettings,
    in_flight: AtomicBool,
    inputs: Mutex<Inputs>,
    view: watch::Sender<ViewState>,
    history: Mutex<Option<HistorySink>>,
}

/// Clears the in-flight flag and loading indicator however apply() exits
struct InFlightGuard<'a> {
    shared: &'a Shared,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        // Observers woken by the view change must already see Idle.
        self.shared.in_flight.store(false, Ordering::Release);
        self.shared.view.send_modify(|view| view.loading = None);
        debug!("apply finished, coordinator idle");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    async fn apply(&self) -> ApplyOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("apply dropped, evaluation already in flight");
            return ApplyOutcome::Dropped;
        }
        let _guard = InFlightGuard { shared: self };

        let (request, query_kind) = {
            let inputs = lock(&self.inputs);
            let request = EvalRequest {
                query: inputs.query.content.clone(),
                data: inputs.input.clone(),
                output_type: inputs.output_type,
                indent: self.settings.indent,
            };
            (request, inputs.query.kind)
        };

        let message = format!("Applying {} to {} input", query_kind, request.data.kind);
        self.view.send_modify(|view| view.loading = Some(message));
        debug!(query_len = request.query.len(), "apply started");

        let query = request.query.clone();
        let cancel = CancellationToken::new();
        let mut evaluation = self.evaluator.evaluate(request, cancel.clone());
        let result = match self.settings.timeout {
            None => evaluation.await,
            Some(after) => match tokio::time::timeout(after, &mut evaluation).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        timeout_ms = after.as_millis() as u64,
                        "evaluation timed out, cancelling"
                    );
                    cancel.cancel();
                    self.view.send_modify(|view| {
                        view.loading = Some("Cancelling timed-out evaluation".to_string())
                    });
                    let late = evaluation.await;
                    debug!(finished = late.is_ok(), "timed-out evaluation released");
                    Err(Error::EvaluationTimeout { after })
                }
            },
        };

        match result {
            Ok(output) => {
                self.view.send_modify(|view| {
                    view.error = None;
                    view.output = Some(output.clone());
                });
                self.record(query_kind, query);
                ApplyOutcome::Applied(output)
            }
            Err(e) => {
                let message = e.to_string();
                debug!(category = e.category(), %message, "apply failed");
                self.view.send_modify(|view| view.error = Some(message.clone()));
                ApplyOutcome::Failed(message)
            }
        }
    }

    fn record(&self, kind: DocumentKind, query: String) {
        let history = lock(&self.history);
        let Some(history) = history.as_ref() else {
            return;
        };
        if let Err(e) = history.record(kind.history_kind(), query) {
            warn!(error = %e, "history recorder unavailable, entry not recorded");
        }
    }
}

/// Debounced, single-flight apply orchestration for one session
pub struct ApplyCoordinator {
    shared: Arc<Shared>,
    debouncer: Mutex<Debouncer>,
}

impl ApplyCoordinator {
    pub fn new(evaluator: Arc<dyn Evaluator>, settings: ApplySettings) -> Self {
        let (view, _) = watch::channel(ViewState::default());
        let debouncer = Debouncer::new(settings.debounce);
        Self {
            shared: Arc::new(Shared {
                evaluator,
                settings,
                in_flight: AtomicBool::new(false),
                inputs: Mutex::new(Inputs::default()),
                view,
                history: Mutex::new(None),
            }),
            debouncer: Mutex::new(debouncer),
        }
    }

    /// Forward successfully applied queries to `sink`
    pub fn with_history(self, sink: HistorySink) -> Self {
        *lock(&self.shared.history) = Some(sink);
        self
    }

    pub fn settings(&self) -> &ApplySettings {
        &self.shared.settings
    }

    pub fn phase(&self) -> ApplyPhase {
        if self.shared.in_flight.load(Ordering::Acquire) {
            ApplyPhase::Applying
        } else {
            ApplyPhase::Idle
        }
    }

    /// Current view state
    pub fn view(&self) -> ViewState {
        self.shared.view.borrow().clone()
    }

    /// Receive every view state change
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.shared.view.subscribe()
    }

    /// Replace the input document
    pub fn set_input(&self, content: impl Into<String>, kind: DocumentKind) {
        lock(&self.shared.inputs).input = TypedDocument::new(content, kind);
        self.edited();
    }

    /// Replace the query (or template) text
    pub fn set_query(&self, content: impl Into<String>, kind: DocumentKind) {
        lock(&self.shared.inputs).query = TypedDocument::new(content, kind);
        self.edited();
    }

    /// Change the desired output kind
    pub fn set_output_type(&self, kind: DocumentKind) {
        lock(&self.shared.inputs).output_type = kind;
        self.edited();
    }

    /// Apply the current inputs now
    pub async fn apply(&self) -> ApplyOutcome {
        self.shared.apply().await
    }

    /// Drop any auto-apply waiting for its quiet period
    pub fn cancel_pending(&self) {
        lock(&self.debouncer).cancel();
    }

    fn edited(&self) {
        if !self.shared.settings.auto_apply {
            return;
        }
        let shared = Arc::clone(&self.shared);
        lock(&self.debouncer).schedule(move || async move {
            let outcome = shared.apply().await;
            debug!(?outcome, "auto-apply finished");
        });
    }
}
