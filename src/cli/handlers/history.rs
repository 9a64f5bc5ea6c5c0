//! History handlers for qplay CLI

use crate::cli::args::*;
use crate::cli::CliApp;
use crate::error::Result;
use crate::store::{HistoryEntry, PageRequest, StoreHandle};
use crate::types::{EntryId, HistoryKind};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::io::{self, Write};

/// Page size used when walking a whole category
const EXPORT_PAGE_SIZE: usize = 100;

pub fn handle_history(app: &CliApp, args: &HistoryArgs) -> Result<()> {
    let store = app.store();
    let result = match &args.command {
        HistoryCommand::List(args) => handle_list(app, &store, args),
        HistoryCommand::Delete(args) => handle_delete(app, &store, args),
        HistoryCommand::Count(args) => handle_count(&store, args),
        HistoryCommand::Stats(args) => handle_stats(&store, args),
        HistoryCommand::Reset(args) => handle_reset(app, &store, args),
        HistoryCommand::Export(args) => handle_export(app, &store, args),
    };
    finish(result, store.close())
}

/// The command's own failure wins over a failure to close the store
fn finish(result: Result<()>, closed: Result<()>) -> Result<()> {
    result.and(closed)
}

fn selected_kinds(kind: Option<HistoryKind>) -> Vec<HistoryKind> {
    match kind {
        Some(kind) => vec![kind],
        None => HistoryKind::ALL.to_vec(),
    }
}

fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|ts| ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn handle_list(app: &CliApp, store: &StoreHandle, args: &ListArgs) -> Result<()> {
    let mut request = PageRequest::new().page(args.page).limit(args.limit);
    if let Some(search) = &args.search {
        request = request.search(search.clone());
    }
    if args.reverse {
        request = request.ascending();
    }

    let page = store.query(args.kind, &request)?;
    for entry in &page.items {
        let mut line = String::new();
        if args.ids {
            line.push_str(&format!("{}\t", entry.id));
        }
        if args.timestamps {
            line.push_str(&format!("{}\t", format_timestamp(entry.timestamp)));
        }
        // Keep multi-line queries on one row
        line.push_str(&entry.content.replace('\n', "\\n"));
        println!("{}", line);
    }

    if !app.quiet {
        if page.items.is_empty() {
            println!("No {} found", args.kind);
        } else if page.has_more {
            println!("\nMore entries available: --page {}", args.page + 1);
        }
    }
    Ok(())
}

fn handle_delete(app: &CliApp, store: &StoreHandle, args: &DeleteArgs) -> Result<()> {
    store.delete(args.kind, EntryId::new(args.id))?;
    if !app.quiet {
        println!("Deleted entry {} from {}", args.id, args.kind);
    }
    Ok(())
}

fn handle_count(store: &StoreHandle, args: &KindArgs) -> Result<()> {
    match args.kind {
        Some(kind) => println!("{}", store.count(kind)?),
        None => {
            for kind in HistoryKind::ALL {
                println!("{}: {}", kind, store.count(kind)?);
            }
        }
    }
    Ok(())
}

fn handle_stats(store: &StoreHandle, args: &KindArgs) -> Result<()> {
    println!("History Statistics");
    println!("==================");
    println!("Capacity per category: {}", store.limits().max_entries);

    for kind in selected_kinds(args.kind) {
        let stats = store.stats(kind)?;
        println!("\n{}", kind);
        println!("  Total entries: {}", stats.total_entries);
        if let Some(oldest) = stats.oldest_timestamp {
            println!("  Oldest entry: {}", format_timestamp(oldest));
        }
        if let Some(newest) = stats.newest_timestamp {
            println!("  Newest entry: {}", format_timestamp(newest));
        }
    }
    Ok(())
}

fn handle_reset(app: &CliApp, store: &StoreHandle, args: &ResetArgs) -> Result<()> {
    if !args.force {
        print!("Are you sure you want to delete all query and template history? (y/N): ");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted");
            return Ok(());
        }
    }

    store.reset()?;
    if !app.quiet {
        println!("History cleared successfully");
    }
    Ok(())
}

#[derive(Serialize)]
struct ExportedEntry<'a> {
    kind: HistoryKind,
    #[serde(flatten)]
    entry: &'a HistoryEntry,
}

/// Every entry of `kind`, newest first
fn all_entries(store: &StoreHandle, kind: HistoryKind) -> Result<Vec<HistoryEntry>> {
    let mut entries = Vec::new();
    let mut page = 0;
    loop {
        let request = PageRequest::new().page(page).limit(EXPORT_PAGE_SIZE);
        let result = store.query(kind, &request)?;
        entries.extend(result.items);
        if !result.has_more {
            return Ok(entries);
        }
        page += 1;
    }
}

fn handle_export(app: &CliApp, store: &StoreHandle, args: &ExportArgs) -> Result<()> {
    let mut collected = Vec::new();
    for kind in selected_kinds(args.kind) {
        for entry in all_entries(store, kind)? {
            collected.push((kind, entry));
        }
    }
    let exported: Vec<_> = collected
        .iter()
        .map(|(kind, entry)| ExportedEntry { kind: *kind, entry })
        .collect();

    let output = match args.format {
        ExportFormat::Json => serde_json::to_string_pretty(&exported)? + "\n",
        ExportFormat::Yaml => serde_yaml::to_string(&exported)?,
        ExportFormat::Plain => {
            let mut output = String::new();
            for entry in &exported {
                output.push_str(&entry.entry.content);
                output.push('\n');
            }
            output
        }
    };

    if let Some(output_file) = &args.output {
        std::fs::write(output_file, output)?;
        if !app.quiet {
            println!(
                "Exported {} entries to {}",
                exported.len(),
                output_file.display()
            );
        }
    } else {
        print!("{}", output);
    }

    Ok(())
}
