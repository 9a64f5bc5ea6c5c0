//! Command-line argument structures for qplay

use crate::types::{DocumentKind, HistoryKind};
use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Where the input document comes from
#[derive(Args)]
pub struct InputArgs {
    /// Input document file ("-" for stdin)
    #[arg(short = 'i', long, value_name = "FILE", default_value = "-")]
    pub input: PathBuf,

    /// Input type (guessed from the file extension if not given)
    #[arg(short = 't', long, value_enum)]
    pub input_type: Option<DocumentKind>,

    /// Output type
    #[arg(short = 'o', long, value_enum, default_value_t = DocumentKind::Json)]
    pub output_type: DocumentKind,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Query to apply
    #[arg(value_name = "QUERY")]
    pub query: String,

    #[command(flatten)]
    pub input: InputArgs,

    /// Treat the query as a template
    #[arg(long)]
    pub template: bool,

    /// Output indentation (overrides configuration)
    #[arg(long)]
    pub indent: Option<usize>,

    /// Do not record the query in history
    #[arg(long)]
    pub no_history: bool,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Input document file
    #[arg(short = 'i', long, value_name = "FILE")]
    pub input: PathBuf,

    /// Input type (guessed from the file extension if not given)
    #[arg(short = 't', long, value_enum)]
    pub input_type: Option<DocumentKind>,

    /// Output type
    #[arg(short = 'o', long, value_enum, default_value_t = DocumentKind::Json)]
    pub output_type: DocumentKind,

    /// Treat edits as templates
    #[arg(long)]
    pub template: bool,

    /// Quiet period in milliseconds (overrides configuration)
    #[arg(long)]
    pub debounce_ms: Option<u64>,
}

#[derive(Args)]
pub struct HistoryArgs {
    #[command(subcommand)]
    pub command: HistoryCommand,
}

#[derive(Subcommand)]
pub enum HistoryCommand {
    /// List history entries, newest first
    List(ListArgs),
    /// Delete one entry
    Delete(DeleteArgs),
    /// Count entries
    Count(KindArgs),
    /// Show history statistics
    Stats(KindArgs),
    /// Remove every entry from every category
    Reset(ResetArgs),
    /// Export entries
    Export(ExportArgs),
}

#[derive(Args)]
pub struct ListArgs {
    /// History category
    #[arg(value_enum, default_value_t = HistoryKind::Queries)]
    pub kind: HistoryKind,

    /// Case-insensitive substring filter
    #[arg(short = 's', long)]
    pub search: Option<String>,

    /// Page number, starting at 0
    #[arg(short = 'p', long, default_value = "0")]
    pub page: usize,

    /// Entries per page
    #[arg(short = 'L', long, default_value = "20")]
    pub limit: usize,

    /// Oldest first
    #[arg(short = 'R', long)]
    pub reverse: bool,

    /// Show timestamps
    #[arg(short = 'T', long)]
    pub timestamps: bool,

    /// Show entry ids
    #[arg(long)]
    pub ids: bool,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// History category
    #[arg(value_enum)]
    pub kind: HistoryKind,

    /// Entry id
    pub id: i64,
}

#[derive(Args)]
pub struct KindArgs {
    /// History category (all categories if not given)
    #[arg(value_enum)]
    pub kind: Option<HistoryKind>,
}

#[derive(Args)]
pub struct ResetArgs {
    /// Confirm deletion without prompting
    #[arg(short = 'F', long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ExportArgs {
    /// History category (all categories if not given)
    #[arg(value_enum)]
    pub kind: Option<HistoryKind>,

    /// Export format
    #[arg(short = 'f', long, value_enum, default_value = "json")]
    pub format: ExportFormat,

    /// Output file (stdout if not specified)
    #[arg(short = 'O', long)]
    pub output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ExportFormat {
    Json,
    Yaml,
    Plain,
}

#[derive(Args)]
pub struct ShareArgs {
    #[command(subcommand)]
    pub command: ShareCommand,
}

#[derive(Subcommand)]
pub enum ShareCommand {
    /// Upload a snapshot and print its id
    Create(ShareCreateArgs),
    /// Download a snapshot
    Fetch(ShareFetchArgs),
}

#[derive(Args)]
pub struct ShareCreateArgs {
    /// Query to share
    #[arg(value_name = "QUERY")]
    pub query: String,

    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Args)]
pub struct ShareFetchArgs {
    /// Share id
    pub id: String,

    /// Print the raw snapshot as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Write a configuration file with defaults
    Init(ConfigInitArgs),
    /// Print the configuration file path
    Path,
    /// Validate the configuration file
    Validate,
}

#[derive(Args)]
pub struct ConfigInitArgs {
    /// Overwrite an existing file
    #[arg(short = 'F', long)]
    pub force: bool,
}
