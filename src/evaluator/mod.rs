//! Evaluator client for qplay
//!
//! The evaluator is an opaque request/reply service: it takes a query, a
//! typed input document and the desired output kind, and answers with a
//! transformed document or an error message. This module defines that
//! contract ([`EvalRequest`], [`Evaluator`]) and a worker-style client
//! ([`EvaluatorClient`]) that runs an [`Engine`] on its own thread and talks
//! to it over channels: one job message in, one reply out.
//!
//! Every request carries a [`CancellationToken`]. Engines that can stop early
//! (such as [`CommandEngine`]) watch it, and the client cancels the token
//! when its caller stops waiting.

pub mod command;
pub mod path;

pub use command::CommandEngine;
pub use path::PathEngine;

use crate::config::{EngineKind, EvaluatorConfig};
use crate::error::{Error, Result};
use crate::types::{DocumentKind, TypedDocument};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
pub use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Jobs buffered before callers wait for the worker
const JOB_QUEUE_CAPACITY: usize = 16;

/// A single evaluation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalRequest {
    pub query: String,
    pub data: TypedDocument,
    pub output_type: DocumentKind,
    pub indent: usize,
}

/// Asynchronous evaluation service
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Evaluate one request. Evaluation failures are [`Error::Evaluation`].
    ///
    /// Once `cancel` fires the evaluator should give up as soon as it can and
    /// answer [`Error::EvaluationCancelled`].
    async fn evaluate(
        &self,
        request: EvalRequest,
        cancel: CancellationToken,
    ) -> Result<TypedDocument>;
}

/// Synchronous evaluation backend driven by [`EvaluatorClient`]
pub trait Engine: Send + 'static {
    fn name(&self) -> &'static str;

    fn evaluate(
        &mut self,
        request: &EvalRequest,
        cancel: &CancellationToken,
    ) -> Result<TypedDocument>;
}

struct Job {
    request: EvalRequest,
    cancel: CancellationToken,
    reply: oneshot::Sender<Result<TypedDocument>>,
}

/// Worker-backed evaluator client. Cloning shares the same worker.
#[derive(Clone)]
pub struct EvaluatorClient {
    tx: mpsc::Sender<Job>,
}

impl EvaluatorClient {
    /// Start a worker thread that owns `engine`.
    ///
    /// The worker exits once every client clone has been dropped.
    pub fn spawn<E: Engine>(mut engine: E) -> Result<Self> {
        let (tx, mut rx) = mpsc::channel::<Job>(JOB_QUEUE_CAPACITY);
        let name = engine.name();

        std::thread::Builder::new()
            .name(format!("qplay-eval-{name}"))
            .spawn(move || {
                while let Some(job) = rx.blocking_recv() {
                    let result = if job.cancel.is_cancelled() {
                        debug!("skipping evaluation cancelled while queued");
                        Err(Error::EvaluationCancelled)
                    } else {
                        engine.evaluate(&job.request, &job.cancel)
                    };
                    if job.reply.send(result).is_err() {
                        debug!("evaluation reply dropped, caller went away");
                    }
                }
                debug!(engine = name, "evaluator worker stopped");
            })?;

        debug!(engine = name, "evaluator worker started");
        Ok(Self { tx })
    }

    /// Start the engine selected in configuration
    pub fn from_config(config: &EvaluatorConfig) -> Result<Self> {
        match config.engine {
            EngineKind::Builtin => Self::spawn(PathEngine::new()),
            EngineKind::Command => Self::spawn(CommandEngine::new(
                config.program.clone(),
                config.args.clone(),
            )),
        }
    }
}

#[async_trait]
impl Evaluator for EvaluatorClient {
    async fn evaluate(
        &self,
        request: EvalRequest,
        cancel: CancellationToken,
    ) -> Result<TypedDocument> {
        // Dropping this future before the reply arrives cancels the job.
        let abandon = cancel.clone().drop_guard();
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Job {
                request,
                cancel,
                reply,
            })
            .await
            .map_err(|_| Error::EvaluatorUnavailable)?;
        let result = response.await.map_err(|_| Error::EvaluatorUnavailable)?;
        abandon.disarm();
        result
    }
}

/// Parse an input document into a JSON value
pub(crate) fn parse_input(data: &TypedDocument) -> Result<Value> {
    match data.kind {
        DocumentKind::Json => serde_json::from_str(&data.content)
            .map_err(|e| Error::evaluation(format!("invalid JSON input: {e}"))),
        DocumentKind::Yaml => serde_yaml::from_str(&data.content)
            .map_err(|e| Error::evaluation(format!("invalid YAML input: {e}"))),
        other => Err(Error::evaluation(format!("unsupported input type: {other}"))),
    }
}

/// Render a JSON value as a document of `kind`
pub(crate) fn render_output(value: &Value, kind: DocumentKind, indent: usize) -> Result<TypedDocument> {
    let content = match kind {
        DocumentKind::Json if indent == 0 => serde_json::to_string(value)?,
        DocumentKind::Json => {
            let indent = vec![b' '; indent];
            let mut buf = Vec::new();
            let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent);
            let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
            value.serialize(&mut ser)?;
            String::from_utf8(buf).map_err(|e| Error::custom(e.to_string()))?
        }
        DocumentKind::Yaml => serde_yaml::to_string(value)?.trim_end().to_string(),
        other => {
            return Err(Error::evaluation(format!(
                "unsupported output type: {other}"
            )));
        }
    };
    Ok(TypedDocument::new(content, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn request(query: &str, input: &str) -> EvalRequest {
        EvalRequest {
            query: query.to_string(),
            data: TypedDocument::json(input),
            output_type: DocumentKind::Json,
            indent: 0,
        }
    }

    struct CountingEngine(Arc<AtomicUsize>);

    impl Engine for CountingEngine {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn evaluate(
            &mut self,
            request: &EvalRequest,
            _cancel: &CancellationToken,
        ) -> Result<TypedDocument> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(TypedDocument::json(request.query.clone()))
        }
    }

    struct PanickingEngine;

    impl Engine for PanickingEngine {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn evaluate(
            &mut self,
            _request: &EvalRequest,
            _cancel: &CancellationToken,
        ) -> Result<TypedDocument> {
            panic!("engine crashed");
        }
    }

    /// Spins on "hang" until cancelled; answers anything else at once
    struct StallingEngine {
        gave_up: Arc<AtomicBool>,
    }

    impl Engine for StallingEngine {
        fn name(&self) -> &'static str {
            "stalling"
        }

        fn evaluate(
            &mut self,
            request: &EvalRequest,
            cancel: &CancellationToken,
        ) -> Result<TypedDocument> {
            if request.query == "hang" {
                while !cancel.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(5));
                }
                self.gave_up.store(true, Ordering::SeqCst);
                return Err(Error::EvaluationCancelled);
            }
            Ok(TypedDocument::json(request.query.clone()))
        }
    }

    #[test]
    fn test_request_wire_form() {
        let value = serde_json::to_value(request("a", "{}")).unwrap();
        assert_eq!(value["outputType"], "json");
        assert_eq!(value["data"]["kind"], "json");
        assert_eq!(value["indent"], 0);
    }

    #[tokio::test]
    async fn test_client_round_trip() {
        let client = EvaluatorClient::spawn(PathEngine::new()).unwrap();
        let output = client
            .evaluate(request("a", r#"{"a": 1}"#), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output, TypedDocument::json("1"));
    }

    #[tokio::test]
    async fn test_one_job_per_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = EvaluatorClient::spawn(CountingEngine(calls.clone())).unwrap();

        client
            .evaluate(request("x", "{}"), CancellationToken::new())
            .await
            .unwrap();
        client
            .clone()
            .evaluate(request("y", "{}"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dead_worker_is_unavailable() {
        let client = EvaluatorClient::spawn(PanickingEngine).unwrap();
        let first = client.evaluate(request("a", "{}"), CancellationToken::new()).await;
        assert!(matches!(first, Err(Error::EvaluatorUnavailable)));

        let second = client.evaluate(request("a", "{}"), CancellationToken::new()).await;
        assert!(matches!(second, Err(Error::EvaluatorUnavailable)));
    }

    #[tokio::test]
    async fn test_cancel_stops_running_job() {
        let gave_up = Arc::new(AtomicBool::new(false));
        let client = EvaluatorClient::spawn(StallingEngine {
            gave_up: gave_up.clone(),
        })
        .unwrap();

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });
        let result = client.evaluate(request("hang", "{}"), cancel).await;
        assert!(matches!(result, Err(Error::EvaluationCancelled)));
        assert!(gave_up.load(Ordering::SeqCst));

        let output = client
            .evaluate(request("ok", "{}"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output.content, "ok");
    }

    #[tokio::test]
    async fn test_abandoned_call_frees_the_worker() {
        let gave_up = Arc::new(AtomicBool::new(false));
        let client = EvaluatorClient::spawn(StallingEngine {
            gave_up: gave_up.clone(),
        })
        .unwrap();

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            client.evaluate(request("hang", "{}"), CancellationToken::new()),
        )
        .await;
        assert!(abandoned.is_err());

        let output = client
            .evaluate(request("next", "{}"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output.content, "next");
        assert!(gave_up.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_job_cancelled_before_it_starts_is_skipped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = EvaluatorClient::spawn(CountingEngine(calls.clone())).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = client.evaluate(request("x", "{}"), cancel).await;
        assert!(matches!(result, Err(Error::EvaluationCancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_render_json_indent() {
        let value = serde_json::json!({"a": [1]});
        let compact = render_output(&value, DocumentKind::Json, 0).unwrap();
        assert_eq!(compact.content, r#"{"a":[1]}"#);

        let pretty = render_output(&value, DocumentKind::Json, 4).unwrap();
        assert_eq!(pretty.content, "{\n    \"a\": [\n        1\n    ]\n}");
    }

    #[test]
    fn test_render_yaml() {
        let value = serde_json::json!({"a": 1});
        let doc = render_output(&value, DocumentKind::Yaml, 2).unwrap();
        assert_eq!(doc.content, "a: 1");
        assert_eq!(doc.kind, DocumentKind::Yaml);
    }

    #[test]
    fn test_unsupported_kinds() {
        let err = parse_input(&TypedDocument::new("x", DocumentKind::Template)).unwrap_err();
        assert_eq!(err.to_string(), "unsupported input type: template");

        let err = render_output(&Value::Null, DocumentKind::Query, 0).unwrap_err();
        assert_eq!(err.category(), "evaluation");
    }

    #[test]
    fn test_parse_yaml_input() {
        let value = parse_input(&TypedDocument::new("a: [1, 2]", DocumentKind::Yaml)).unwrap();
        assert_eq!(value, serde_json::json!({"a": [1, 2]}));
    }
}
