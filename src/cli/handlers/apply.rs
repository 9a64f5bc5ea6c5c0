//! Apply and watch handlers for qplay CLI

use crate::cli::args::*;
use crate::cli::{read_document, CliApp};
use crate::coordinator::{ApplyCoordinator, ApplyOutcome, ApplyPhase, ApplySettings, ViewState};
use crate::error::{Error, Result};
use crate::evaluator::EvaluatorClient;
use crate::session::Session;
use crate::types::{DocumentKind, TypedDocument};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

fn query_kind(template: bool) -> DocumentKind {
    if template {
        DocumentKind::Template
    } else {
        DocumentKind::Query
    }
}

fn open_session(app: &CliApp, settings: ApplySettings) -> Result<Session> {
    app.config.validate()?;
    let evaluator = EvaluatorClient::from_config(&app.config.evaluator)?;
    app.verbose_println(&format!(
        "Using {:?} evaluator, history at {}",
        app.config.evaluator.engine,
        app.config.store.path.display()
    ));
    Ok(Session::with_parts(app.store(), Arc::new(evaluator), settings))
}

pub async fn handle_apply(app: &CliApp, args: &ApplyArgs) -> Result<()> {
    let input = read_document(&args.input.input, args.input.input_type)?;

    let mut settings = ApplySettings::from(&app.config.apply);
    settings.auto_apply = false;
    if let Some(indent) = args.indent {
        settings.indent = indent;
    }

    let outcome = if args.no_history {
        app.verbose_println("History recording disabled");
        let evaluator = EvaluatorClient::from_config(&app.config.evaluator)?;
        let coordinator = ApplyCoordinator::new(Arc::new(evaluator), settings);
        apply_once(&coordinator, input, args).await
    } else {
        let session = open_session(app, settings)?;
        let outcome = apply_once(session.coordinator(), input, args).await;
        session.close().await?;
        outcome
    };

    match outcome {
        ApplyOutcome::Applied(output) => {
            println!("{}", output.content);
            Ok(())
        }
        ApplyOutcome::Failed(message) => Err(Error::evaluation(message)),
        ApplyOutcome::Dropped => Err(Error::custom("apply dropped: evaluation already running")),
    }
}

async fn apply_once(
    coordinator: &ApplyCoordinator,
    input: TypedDocument,
    args: &ApplyArgs,
) -> ApplyOutcome {
    coordinator.set_input(input.content, input.kind);
    coordinator.set_query(args.query.clone(), query_kind(args.template));
    coordinator.set_output_type(args.input.output_type);
    coordinator.apply().await
}

pub async fn handle_watch(app: &CliApp, args: &WatchArgs) -> Result<()> {
    if args.input == std::path::Path::new("-") {
        return Err(Error::invalid_arguments(
            "watch reads query edits from stdin; pass the input as a file",
        ));
    }
    let input = read_document(&args.input, args.input_type)?;

    let mut settings = ApplySettings::from(&app.config.apply);
    settings.auto_apply = true;
    if let Some(ms) = args.debounce_ms {
        settings.debounce = Duration::from_millis(ms);
    }

    let session = open_session(app, settings)?;
    let coordinator = session.coordinator();
    let printer = tokio::spawn(print_view_changes(coordinator.subscribe()));

    coordinator.set_output_type(args.output_type);
    coordinator.set_input(input.content, input.kind);

    let kind = query_kind(args.template);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        app.verbose_println(&format!("Query edit: {}", line));
        coordinator.set_query(line, kind);
    }

    // Input closed: apply the last edit now instead of waiting out the delay.
    coordinator.cancel_pending();
    wait_idle(coordinator).await;
    coordinator.apply().await;

    session.close().await?;
    printer
        .await
        .map_err(|e| Error::custom(format!("output printer failed: {e}")))?;
    Ok(())
}

async fn wait_idle(coordinator: &ApplyCoordinator) {
    let mut view = coordinator.subscribe();
    while coordinator.phase() == ApplyPhase::Applying {
        if view.changed().await.is_err() {
            break;
        }
    }
}

/// Print each new output or error until the coordinator goes away
async fn print_view_changes(mut view: watch::Receiver<ViewState>) {
    let mut last_output: Option<TypedDocument> = None;
    let mut last_error: Option<String> = None;

    while view.changed().await.is_ok() {
        let state = view.borrow_and_update().clone();
        match &state.error {
            Some(error) if last_error.as_ref() != Some(error) => eprintln!("error: {}", error),
            None if state.output != last_output || last_error.is_some() => {
                if let Some(output) = &state.output {
                    println!("{}", output.content);
                }
            }
            _ => {}
        }
        last_output = state.output;
        last_error = state.error;
    }
}
