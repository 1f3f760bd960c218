use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{anyhow, Context};
use catfetch_hash::derive_version_id;
use catfetch_store::{CatDb, StoreConfig};
use catfetch_types::{parse_created_at, CatMetadata, EntityId, VersionId};
use chrono::Utc;
use colored::Colorize;
use serde_json::json;
use tracing::warn;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    let db = cli.db.as_path();
    let config = cli.config.as_deref();
    match cli.command {
        Command::Put(args) => with_store(db, config, |db| cmd_put(db, args, format)),
        Command::Add(args) => with_store(db, config, |db| cmd_add(db, args, format)),
        Command::Show(args) => with_store(db, config, |db| cmd_show(db, args, format)),
        Command::Cat(args) => with_store(db, config, |db| cmd_cat(db, args)),
        Command::List(args) => with_store(db, config, |db| cmd_list(db, args, format)),
        Command::Stats => with_store(db, config, |db| cmd_stats(db, format)),
        Command::Hash(args) => cmd_hash(&args, format),
    }
}

/// Open the store, run `f`, and close the store even if `f` failed.
fn with_store<F>(path: &Path, config: Option<&Path>, f: F) -> anyhow::Result<()>
where
    F: FnOnce(&CatDb) -> anyhow::Result<()>,
{
    let config = match config {
        Some(file) => StoreConfig::from_toml_file(file)
            .with_context(|| format!("loading config {}", file.display()))?,
        None => StoreConfig::default(),
    };
    let db = CatDb::open_with_config(path, config)
        .with_context(|| format!("opening store {}", path.display()))?;

    let outcome = f(&db);
    finish(outcome, db.close().map(|_| ()).context("closing store"))
}

/// Combine a command's result with the store's close result. A close failure
/// is returned when the command succeeded and logged when it did not.
fn finish(outcome: anyhow::Result<()>, closed: anyhow::Result<()>) -> anyhow::Result<()> {
    match (outcome, closed) {
        (Ok(()), closed) => closed,
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            warn!(error = %format!("{close_err:#}"), "failed to close store after command error");
            Err(e)
        }
    }
}

fn cmd_hash(args: &HashArgs, format: OutputFormat) -> anyhow::Result<()> {
    let version = derive_version_id(&args.url)?;
    match format {
        OutputFormat::Json => print_json(&json!({ "url": args.url, "version": version })),
        OutputFormat::Text => {
            println!("{}", version.to_string().yellow());
            Ok(())
        }
    }
}

fn cmd_put(db: &CatDb, args: PutArgs, format: OutputFormat) -> anyhow::Result<()> {
    let text = fs::read_to_string(&args.meta)
        .with_context(|| format!("reading {}", args.meta.display()))?;
    let metadata: CatMetadata = serde_json::from_str(&text)
        .with_context(|| format!("parsing metadata record {}", args.meta.display()))?;
    store(db, &metadata, &args.image, format)
}

fn cmd_add(db: &CatDb, args: AddArgs, format: OutputFormat) -> anyhow::Result<()> {
    let created_at = match &args.created_at {
        Some(value) => parse_created_at(value)?,
        None => Utc::now(),
    };
    let metadata = CatMetadata::new(args.id, args.url, args.mime, created_at).with_tags(args.tags);
    store(db, &metadata, &args.image, format)
}

fn store(
    db: &CatDb,
    metadata: &CatMetadata,
    image: &Path,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let data = fs::read(image).with_context(|| format!("reading {}", image.display()))?;
    let (entity, version) = db.write_version(metadata, &data)?;
    match format {
        OutputFormat::Json => print_json(&json!({
            "entity": entity,
            "version": version,
            "bytes": data.len(),
        })),
        OutputFormat::Text => {
            println!(
                "{} Stored {} version {} ({} bytes)",
                "✓".green().bold(),
                entity.as_str().bold(),
                version.to_string().yellow(),
                data.len()
            );
            Ok(())
        }
    }
}

fn cmd_show(db: &CatDb, args: VersionArgs, format: OutputFormat) -> anyhow::Result<()> {
    let entity = entity(&args.entity)?;
    let metadata = db
        .read_metadata(&entity, &args.version)?
        .ok_or_else(|| not_found(&entity, &args.version))?;
    match format {
        OutputFormat::Json => print_json(&metadata),
        OutputFormat::Text => {
            println!("Cat {} version {}", entity.as_str().bold(), args.version.to_string().yellow());
            println!("  Created: {}", metadata.encoded_created_at());
            println!("  URL: {}", metadata.url.blue());
            println!("  Type: {}", metadata.mime_type.cyan());
            if metadata.tags.is_empty() {
                println!("  Tags: {}", "(none)".dimmed());
            } else {
                println!("  Tags: {}", metadata.encoded_tags());
            }
            Ok(())
        }
    }
}

fn cmd_cat(db: &CatDb, args: CatArgs) -> anyhow::Result<()> {
    let entity = entity(&args.target.entity)?;
    let version = args.target.version;
    let data = db
        .read_data(&entity, &version)?
        .ok_or_else(|| not_found(&entity, &version))?;
    match &args.output {
        Some(path) => {
            fs::write(path, &data).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("{} Wrote {} bytes to {}", "✓".green(), data.len(), path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn cmd_list(db: &CatDb, args: ListArgs, format: OutputFormat) -> anyhow::Result<()> {
    match args.entity {
        Some(raw) => {
            let entity = entity(&raw)?;
            let versions = db.list_versions(&entity)?;
            match format {
                OutputFormat::Json => print_json(&json!({ "entity": entity, "versions": versions })),
                OutputFormat::Text => {
                    if versions.is_empty() {
                        println!("No versions of {}.", entity.as_str().bold());
                    }
                    for version in versions {
                        println!("{}", version.to_string().yellow());
                    }
                    Ok(())
                }
            }
        }
        None => {
            let entities = db.list_entities()?;
            match format {
                OutputFormat::Json => print_json(&entities),
                OutputFormat::Text => {
                    if entities.is_empty() {
                        println!("No cats stored.");
                    }
                    for entity in entities {
                        let count = db.list_versions(&entity)?.len();
                        println!("{}  {} version(s)", entity.as_str().bold(), count);
                    }
                    Ok(())
                }
            }
        }
    }
}

fn cmd_stats(db: &CatDb, format: OutputFormat) -> anyhow::Result<()> {
    let stats = db.stats()?;
    match format {
        OutputFormat::Json => print_json(&stats),
        OutputFormat::Text => {
            println!("Store {}", db.path().display().to_string().bold());
            println!("  Entities: {}", stats.entities);
            println!("  Versions: {}", stats.versions);
            println!("  Payload: {} bytes", stats.payload_bytes);
            println!(
                "  Pages: {} allocated ({} leaf, {} branch) of {} bytes",
                stats.allocated_pages, stats.leaf_pages, stats.branch_pages, stats.page_size
            );
            println!("  Tree height: {}", stats.tree_height);
            println!("  Stored: {} bytes, fragmented: {} bytes", stats.stored_bytes, stats.fragmented_bytes);
            Ok(())
        }
    }
}

fn entity(raw: &str) -> anyhow::Result<EntityId> {
    EntityId::new(raw).with_context(|| format!("invalid entity id {raw:?}"))
}

fn not_found(entity: &EntityId, version: &VersionId) -> anyhow::Error {
    anyhow!("no version {version} of {entity}")
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
