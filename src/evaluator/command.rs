//! External program engine
//!
//! Runs a command-line processor such as `jq` for every request. The input
//! document is converted to JSON and written to the program's stdin, the
//! query is passed as the last argument, and the JSON values printed on
//! stdout become the result. A cancelled evaluation kills the program.

use super::{parse_input, render_output, Engine, EvalRequest};
use crate::error::{Error, Result};
use crate::types::TypedDocument;
use serde_json::Value;
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How often a running program is checked for exit or cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Engine backed by an external program
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Engine for CommandEngine {
    fn name(&self) -> &'static str {
        "command"
    }

    fn evaluate(
        &mut self,
        request: &EvalRequest,
        cancel: &CancellationToken,
    ) -> Result<TypedDocument> {
        let input = serde_json::to_vec(&parse_input(&request.data)?)?;

        debug!(program = %self.program, "running evaluator command");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(&request.query)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::evaluation(format!("failed to start {}: {e}", self.program)))?;

        // Feed stdin from another thread so a chatty child cannot deadlock us.
        let writer = child.stdin.take().map(|mut stdin| {
            std::thread::spawn(move || {
                // The child may exit without reading its input.
                let _ = stdin.write_all(&input);
            })
        });

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if cancel.is_cancelled() {
                debug!(program = %self.program, "killing cancelled evaluator command");
                // It may have exited since the last poll.
                let _ = child.kill();
                let _ = child.wait();
                // Pipe threads are left to finish on their own; a grandchild
                // may still hold the pipes open.
                return Err(Error::EvaluationCancelled);
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        if let Some(writer) = writer {
            let _ = writer.join();
        }
        let stdout = collect(stdout);
        let stderr = collect(stderr);

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("{} exited with {}", self.program, status)
            } else {
                stderr
            };
            return Err(Error::evaluation(message));
        }

        let stdout = String::from_utf8_lossy(&stdout);
        let mut values = serde_json::Deserializer::from_str(&stdout)
            .into_iter::<Value>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::evaluation(format!("invalid output from {}: {e}", self.program)))?;

        let value = match values.len() {
            0 => Value::Null,
            1 => values.remove(0),
            _ => Value::Array(values),
        };
        render_output(&value, request.output_type, request.indent)
    }
}

/// Read a pipe to the end on its own thread
fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|reader| reader.join().ok())
        .unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::types::DocumentKind;
    use std::time::Instant;

    fn request(query: &str, input: &str) -> EvalRequest {
        EvalRequest {
            query: query.to_string(),
            data: TypedDocument::json(input),
            output_type: DocumentKind::Json,
            indent: 0,
        }
    }

    fn run(engine: &mut CommandEngine, request: &EvalRequest) -> Result<TypedDocument> {
        engine.evaluate(request, &CancellationToken::new())
    }

    fn shell(script: &str) -> CommandEngine {
        CommandEngine::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    #[test]
    fn test_passes_input_through_stdin() {
        let mut engine = shell("cat");
        let output = run(&mut engine, &request("ignored", r#"{ "a" : 1 }"#)).unwrap();
        assert_eq!(output.content, r#"{"a":1}"#);
    }

    #[test]
    fn test_multiple_values_become_array() {
        let mut engine = shell("echo 1; echo 2");
        let output = run(&mut engine, &request(".", "{}")).unwrap();
        assert_eq!(output.content, "[1,2]");
    }

    #[test]
    fn test_query_is_last_argument() {
        // With `sh -c`, the first extra argument becomes $0.
        let mut engine = shell("printf '\"%s\"' \"$0\"");
        let output = run(&mut engine, &request(".a", "{}")).unwrap();
        assert_eq!(output.content, "\".a\"");
    }

    #[test]
    fn test_failure_surfaces_stderr() {
        let mut engine = shell("echo 'compile error: bad query' >&2; exit 3");
        let err = run(&mut engine, &request("a..", "{}")).unwrap_err();
        assert_eq!(err.to_string(), "compile error: bad query");
        assert_eq!(err.category(), "evaluation");
    }

    #[test]
    fn test_missing_program() {
        let mut engine = CommandEngine::new("qplay-definitely-not-installed", vec![]);
        let err = run(&mut engine, &request(".", "{}")).unwrap_err();
        assert!(err.to_string().starts_with("failed to start"));
    }

    #[test]
    fn test_cancel_kills_running_program() {
        let mut engine = shell("exec sleep 30");
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        let timer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            canceller.cancel();
        });

        let started = Instant::now();
        let err = engine.evaluate(&request(".", "{}"), &cancel).unwrap_err();
        timer.join().unwrap();

        assert!(matches!(err, Error::EvaluationCancelled));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
