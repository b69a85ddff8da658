//! Keyweave normalizes job keyword text into a queryable table.

use std::path::PathBuf;

use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use keyweave_core::KeyweaveConfig;
use keyweave_extract::normalize_keyword;
use keyweave_migrate::{RollbackOptions, SchemaStatus};
use keyweave_store::analytics::{self, RecordScope};
use keyweave_store::KeywordStore;

const DEFAULT_LIMIT: usize = 20;

fn print_usage() {
    println!("Keyweave: job keyword normalization");
    println!();
    println!("Usage: keyweave <command> [options]");
    println!();
    println!("Commands:");
    println!("  migrate                        Apply the schema and migrate keyword text");
    println!("  status                         Show schema state and keyword statistics");
    println!("  rollback [--export FILE]       Drop the keyword table (optionally export first)");
    println!("  top [N] [--category C]         Top keywords by total frequency");
    println!("  cooccur [N] [--min M]          Most frequent keyword pairs");
    println!("  match <keyword>...             Rank job records by matched keywords");
    println!("  help                           Show this help message");
    println!();
    println!("Database path comes from KEYWEAVE_DB (default data/keyweave.db).");
}

/// Value following `--name`, if present.
fn option_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// First positional argument parsed as a count, skipping option pairs.
fn positional_limit(args: &[String]) -> anyhow::Result<usize> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg.starts_with("--") {
            iter.next();
            continue;
        }
        return arg
            .parse()
            .map_err(|_| anyhow::anyhow!("Expected a number, got '{}'", arg));
    }
    Ok(DEFAULT_LIMIT)
}

fn open_store(config: &KeyweaveConfig) -> anyhow::Result<KeywordStore> {
    info!("Database: {}", config.database_path.display());
    KeywordStore::open(&config.database_path)
        .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_status(status: &SchemaStatus) {
    println!("Legacy table:   {}", if status.legacy_table { "present" } else { "MISSING" });
    println!("Keyword table:  {}", if status.keyword_table { "present" } else { "absent" });
    println!(
        "Indexes:        {}/{}",
        status.indexes_present.len(),
        status.indexes_present.len() + status.indexes_missing.len()
    );
    for name in &status.indexes_missing {
        println!("  missing: {}", name);
    }
    match status.version {
        Some(v) => println!("Version:        {}", v),
        None => println!("Version:        not applied"),
    }
    println!("Foreign keys:   {}", if status.foreign_keys { "enforced" } else { "OFF" });
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");
    let rest = args.get(2..).unwrap_or_default();

    if matches!(command, "help" | "--help" | "-h") {
        print_usage();
        return Ok(());
    }

    let config = KeyweaveConfig::from_env()?;

    match command {
        "migrate" => {
            let store = open_store(&config)?;
            let report = keyweave_migrate::migrate(&mut store.session(), &config, None)?;
            keyweave_migrate::print_report(&report);
        }
        "status" => {
            let store = open_store(&config)?;
            let status = keyweave_migrate::schema_status(&store.session())?;
            print_status(&status);
            if status.keyword_table {
                let stats = store.get_stats()?;
                println!();
                print_json(&stats)?;
            }
            if !status.is_applied() {
                std::process::exit(1);
            }
        }
        "rollback" => {
            let store = open_store(&config)?;
            let export_path = option_value(rest, "--export").map(PathBuf::from);
            let options = RollbackOptions {
                export: export_path.is_some(),
                separator: config.export_separator.clone(),
            };
            let report = keyweave_migrate::rollback(&mut store.session(), &options)?;
            if let (Some(path), Some(export)) = (&export_path, &report.export) {
                std::fs::write(path, serde_json::to_string_pretty(export)?)
                    .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path.display(), e))?;
                info!("Wrote export of {} record(s) to {}", export.len(), path.display());
            }
            keyweave_migrate::print_rollback_report(&report);
        }
        "top" => {
            let store = open_store(&config)?;
            let limit = positional_limit(rest)?;
            let category = option_value(rest, "--category");
            let top = analytics::top_keywords_by_frequency(&store.session(), limit, category)?;
            print_json(&top)?;
        }
        "cooccur" => {
            let store = open_store(&config)?;
            let limit = positional_limit(rest)?;
            let min_count = match option_value(rest, "--min") {
                Some(v) => v
                    .parse()
                    .map_err(|_| anyhow::anyhow!("--min expects a number, got '{}'", v))?,
                None => 1,
            };
            let pairs =
                analytics::keyword_co_occurrence(&store.session(), RecordScope::All, min_count, limit)?;
            print_json(&pairs)?;
        }
        "match" => {
            let keywords: Vec<String> = rest
                .iter()
                .map(|k| normalize_keyword(k))
                .filter(|k| !k.is_empty())
                .collect();
            if keywords.is_empty() {
                eprintln!("Usage: keyweave match <keyword>...");
                std::process::exit(1);
            }
            let store = open_store(&config)?;
            let ranked = analytics::rank_records_by_keywords(
                &store.session(),
                keywords.as_slice(),
                DEFAULT_LIMIT,
            )?;
            print_json(&json!({ "keywords": keywords, "records": ranked }))?;
        }
        other => {
            eprintln!("Unknown command: {}. Use 'keyweave help' for usage.", other);
            std::process::exit(1);
        }
    }

    Ok(())
}
