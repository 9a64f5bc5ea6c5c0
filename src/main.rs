//! qplay - query playground
//!
//! This is the main entry point for the qplay command-line application.
//! It initializes logging and handles errors gracefully.

use qplay::cli;
use qplay::config::Config;
use std::process;
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    // RUST_LOG wins; otherwise use the configured level
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured_level()))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn configured_level() -> String {
    Config::load()
        .map(|config| config.logging.level)
        .unwrap_or_else(|_| "warn".to_string())
}
