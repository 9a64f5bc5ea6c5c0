//! qplay - query playground core
//!
//! This library provides the non-visual core of an interactive query
//! playground:
//! - Debounced, single-flight application of a query to an input document
//! - An evaluator client that talks to a pluggable evaluation engine
//! - Bounded, deduplicated history of applied queries and templates in SQLite
//! - A client for the remote share service
//!
//! # Examples
//!
//! ```rust,no_run
//! use qplay::{Config, Session};
//! use qplay::types::DocumentKind;
//!
//! # async fn demo() -> qplay::Result<()> {
//! let session = Session::open(&Config::default())?;
//! session.coordinator().set_input(r#"{"a": 1}"#, DocumentKind::Json);
//! session.coordinator().set_query("a", DocumentKind::Query);
//! let outcome = session.coordinator().apply().await;
//! println!("{outcome:?}");
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod debounce;
pub mod error;
pub mod evaluator;
pub mod history;
pub mod prelude;
pub mod session;
pub mod share;
pub mod store;
pub mod types;

pub use config::Config;
pub use coordinator::{ApplyCoordinator, ApplyOutcome, ApplySettings, ViewState};
pub use error::{Error, Result};
pub use session::Session;
pub use store::{HistoryStore, StoreHandle};

/// The default history database file name
pub const DEFAULT_STORE_FILE: &str = "qplay.db";

/// Get the default history database path
///
/// Uses the platform data directory when available and falls back to the
/// home directory otherwise.
pub fn default_store_path() -> Result<PathBuf> {
    if let Some(data_dir) = dirs::data_dir() {
        return Ok(data_dir.join("qplay").join(DEFAULT_STORE_FILE));
    }
    let home = home::home_dir().ok_or(Error::HomeDirectoryNotFound)?;
    Ok(home.join(".qplay").join(DEFAULT_STORE_FILE))
}
