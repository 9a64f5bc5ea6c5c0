//! Command-line interface module for qplay
//!
//! This module is organized into submodules:
//! - `args`: Command-line argument structures
//! - `handlers`: Command handler implementations

mod args;
mod handlers;

pub use args::*;
use handlers::*;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::{StoreHandle, StoreLimits};
use crate::types::{DocumentKind, TypedDocument};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::warn;

/// qplay - query playground
#[derive(Parser)]
#[command(name = "qplay")]
#[command(about = "Apply queries to JSON and YAML documents, with history and sharing")]
#[command(version, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply a query to an input document once
    Apply(ApplyArgs),
    /// Read query edits from stdin and auto-apply them
    Watch(WatchArgs),
    /// Browse and manage query and template history
    History(HistoryArgs),
    /// Create or fetch shared snapshots
    Share(ShareArgs),
    /// Manage configuration
    Config(ConfigArgs),
}

/// Main CLI application
pub struct CliApp {
    pub config: Config,
    pub config_path: Option<PathBuf>,
    pub verbose: bool,
    pub quiet: bool,
}

impl CliApp {
    /// Create a new CLI application
    pub fn new(cli: &Cli) -> Result<Self> {
        let config = if let Some(config_path) = &cli.config {
            Config::load_from_path(config_path)?
        } else {
            Config::load().unwrap_or_else(|e| {
                warn!(error = %e, "ignoring unreadable configuration, using defaults");
                Config::default()
            })
        };

        Ok(Self {
            config,
            config_path: cli.config.clone(),
            verbose: cli.verbose,
            quiet: cli.quiet,
        })
    }

    /// Run the CLI application
    pub fn run(&self, command: &Commands) -> Result<()> {
        match command {
            Commands::Apply(args) => self.block_on(handle_apply(self, args)),
            Commands::Watch(args) => self.block_on(handle_watch(self, args)),
            Commands::History(args) => handle_history(self, args),
            Commands::Share(args) => self.block_on(handle_share(self, args)),
            Commands::Config(args) => handle_config(self, args),
        }
    }

    fn block_on<F: std::future::Future<Output = Result<()>>>(&self, future: F) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(future)
    }

    /// Handle to the configured history store
    pub fn store(&self) -> StoreHandle {
        StoreHandle::new(&self.config.store.path, StoreLimits::from(&self.config.store))
    }

    pub fn verbose_println(&self, message: &str) {
        if self.verbose && !self.quiet {
            eprintln!("[verbose] {}", message);
        }
    }
}

/// Read a document from `path` ("-" reads stdin)
pub(crate) fn read_document(path: &Path, kind: Option<DocumentKind>) -> Result<TypedDocument> {
    let kind = match kind {
        Some(kind) => kind,
        None => guess_kind(path),
    };
    if !matches!(kind, DocumentKind::Json | DocumentKind::Yaml) {
        return Err(Error::invalid_arguments(format!(
            "input type must be json or yaml, got {kind}"
        )));
    }

    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };
    Ok(TypedDocument::new(content, kind))
}

fn guess_kind(path: &Path) -> DocumentKind {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            DocumentKind::Yaml
        }
        _ => DocumentKind::Json,
    }
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let app = CliApp::new(&cli)?;
    app.run(&cli.command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from(["qplay", "apply", "a.b", "-i", "data.yaml", "--no-history"])
            .unwrap();
        let Commands::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(args.query, "a.b");
        assert_eq!(args.input.input, PathBuf::from("data.yaml"));
        assert_eq!(args.input.output_type, DocumentKind::Json);
        assert!(args.no_history);
    }

    #[test]
    fn test_parse_history_list() {
        let cli =
            Cli::try_parse_from(["qplay", "history", "list", "templates", "-s", "foo"]).unwrap();
        let Commands::History(HistoryArgs {
            command: HistoryCommand::List(args),
        }) = cli.command
        else {
            panic!("expected history list");
        };
        assert_eq!(args.kind, crate::types::HistoryKind::Templates);
        assert_eq!(args.search.as_deref(), Some("foo"));
        assert_eq!(args.limit, 20);
    }

    #[test]
    fn test_guess_kind() {
        assert_eq!(guess_kind(Path::new("a.yml")), DocumentKind::Yaml);
        assert_eq!(guess_kind(Path::new("a.YAML")), DocumentKind::Yaml);
        assert_eq!(guess_kind(Path::new("a.json")), DocumentKind::Json);
        assert_eq!(guess_kind(Path::new("-")), DocumentKind::Json);
    }

    #[test]
    fn test_read_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("input.yaml");
        std::fs::write(&path, "a: 1\n").unwrap();

        let doc = read_document(&path, None).unwrap();
        assert_eq!(doc, TypedDocument::new("a: 1\n", DocumentKind::Yaml));

        let err = read_document(&path, Some(DocumentKind::Query)).unwrap_err();
        assert_eq!(err.category(), "arguments");
    }
}
