//! Spool CLI - inspect and edit a spool data file from the shell
//!
//! Values in the string key/value space are JSON documents; `put` accepts
//! any JSON literal and falls back to treating the argument as a string.

use anyhow::Context;
use clap::{Parser, Subcommand};
use spool_core::{FileStorage, Spool, Storage};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "spool", about = "Embedded single-file key-value store", version)]
struct Cli {
    /// Path to the spool data file
    file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the value stored under a key
    Get { key: String },

    /// Store a JSON value under a key
    Put { key: String, value: String },

    /// Delete a key
    Del { key: String },

    /// List physical record keys, optionally filtered by prefix
    Keys {
        #[arg(long)]
        prefix: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Get { key } => {
            let db = Spool::open(&cli.file).context("opening data file")?;
            match db.get::<serde_json::Value>(&key)? {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => println!("(not found)"),
            }
        }
        Command::Put { key, value } => {
            let db = Spool::open(&cli.file).context("opening data file")?;
            let value: serde_json::Value = serde_json::from_str(&value)
                .unwrap_or_else(|_| serde_json::Value::String(value));
            db.put(&key, &value)?;
            db.sync()?;
        }
        Command::Del { key } => {
            let db = Spool::open(&cli.file).context("opening data file")?;
            if db.delete(&key)? {
                db.sync()?;
                println!("deleted");
            } else {
                println!("(not found)");
            }
        }
        Command::Keys { prefix } => {
            // Raw engine view: shows collection entity keys as well as the
            // facade's namespaced kv keys.
            let storage = FileStorage::open(&cli.file).context("opening data file")?;
            let keys = match prefix {
                Some(prefix) => storage.keys_with_prefix(prefix.as_bytes()),
                None => storage.keys(),
            };
            for key in keys {
                println!("{}", String::from_utf8_lossy(key.as_bytes()));
            }
        }
    }

    Ok(())
}
