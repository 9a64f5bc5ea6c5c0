//! Configuration handlers for qplay CLI

use crate::cli::args::*;
use crate::cli::CliApp;
use crate::config::Config;
use crate::error::{Error, Result};
use std::path::PathBuf;

fn config_path(app: &CliApp) -> Result<PathBuf> {
    match &app.config_path {
        Some(path) => Ok(path.clone()),
        None => Config::default_config_path(),
    }
}

pub fn handle_config(app: &CliApp, args: &ConfigArgs) -> Result<()> {
    match &args.command {
        ConfigCommand::Show => {
            let config_json = serde_json::to_string_pretty(&app.config)?;
            println!("{}", config_json);
        }
        ConfigCommand::Init(init) => {
            let path = config_path(app)?;
            if path.exists() && !init.force {
                return Err(Error::invalid_arguments(format!(
                    "{} already exists, use --force to overwrite",
                    path.display()
                )));
            }
            Config::default().save_to_path(&path)?;
            if !app.quiet {
                println!("Configuration initialized at {}", path.display());
            }
        }
        ConfigCommand::Path => {
            println!("{}", config_path(app)?.display());
        }
        ConfigCommand::Validate => match app.config.validate() {
            Ok(_) => println!("Configuration is valid"),
            Err(e) => println!("Configuration validation failed: {}", e),
        },
    }

    Ok(())
}
