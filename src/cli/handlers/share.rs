//! Share handlers for qplay CLI

use crate::cli::args::*;
use crate::cli::{read_document, CliApp};
use crate::error::Result;
use crate::share::ShareClient;

pub async fn handle_share(app: &CliApp, args: &ShareArgs) -> Result<()> {
    let client = ShareClient::new(&app.config.share);
    app.verbose_println(&format!("Share service: {}", app.config.share.base_url));

    match &args.command {
        ShareCommand::Create(args) => {
            let input = read_document(&args.input.input, args.input.input_type)?;
            let request = client.request(
                input.content,
                input.kind,
                args.query.clone(),
                args.input.output_type,
            );
            let id = client.create(&request).await?;
            if app.quiet {
                println!("{}", id);
            } else {
                println!("Created share {}", id);
            }
        }
        ShareCommand::Fetch(args) => {
            let snapshot = client.fetch(&args.id).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
                return Ok(());
            }

            println!("Query: {}", snapshot.query);
            println!("Output type: {}", snapshot.output_type);
            if let Some(expires_at) = &snapshot.expires_at {
                println!("Expires: {}", expires_at);
            }
            println!("Input ({}):", snapshot.input_type);
            println!("{}", snapshot.input_data);
        }
    }
    Ok(())
}
