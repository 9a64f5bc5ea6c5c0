//! Command handler implementations for qplay CLI
//!
//! This module organizes command handlers into logical groups:
//! - `apply`: One-shot apply and the stdin-driven watch loop
//! - `history`: History browsing and maintenance
//! - `share`: Share service commands
//! - `config`: Configuration handlers

mod apply;
mod config;
mod history;
mod share;

pub use apply::*;
pub use config::*;
pub use history::*;
pub use share::*;
