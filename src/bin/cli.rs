//! SplitStore CLI
//!
//! Inspect and edit a collection of JSON documents from the command line.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;
use splitstore::{SplitStore, StoreOptions};
use tracing_subscriber::{fmt, EnvFilter};

/// SplitStore CLI
#[derive(Parser, Debug)]
#[command(name = "splitstore-cli")]
#[command(about = "Inspect a directory of JSON documents")]
#[command(version)]
struct Args {
    /// Directory the collection lives under
    #[arg(short, long, default_value = ".")]
    base_dir: PathBuf,

    /// Collection name
    #[arg(short, long)]
    name: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a key's document
    Get {
        /// The key to get
        key: String,
    },

    /// Store a JSON value under a key
    Set {
        /// The key to set
        key: String,

        /// The value, as a JSON literal
        value: String,
    },

    /// Delete a key's document
    Delete {
        /// The key to delete
        key: String,
    },

    /// Print every document in the collection
    List,

    /// Remove every document in the collection
    Clear,

    /// Print the number of documents
    Size,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,splitstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> splitstore::Result<()> {
    let options = StoreOptions::builder()
        .name(args.name)
        .base_dir(args.base_dir)
        .build()?;
    let store = SplitStore::open(options)?;

    match args.command {
        Commands::Get { key } => print_json(&store.get(&key)?)?,
        Commands::Set { key, value } => {
            let value: Value = serde_json::from_str(&value)?;
            store.set(&key, value)?;
        }
        Commands::Delete { key } => store.delete(&key)?,
        Commands::List => {
            let all = store.get_all()?;
            print_json(&serde_json::to_value(all)?)?;
        }
        Commands::Clear => store.clear()?,
        Commands::Size => println!("{}", store.size()),
    }

    Ok(())
}

fn print_json(value: &Value) -> splitstore::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
