//! Colonnade CLI
//!
//! Command-line tools for inspecting how Colonnade lays documents and
//! indexes out in its key-value table.
//!
//! Every command loads a JSON fixture (collections, indexes and documents)
//! into an in-memory database first.
//!
//! # Commands
//!
//! - `records` - Dump the physical records
//! - `plan` - Show the scan plan compiled for a predicate
//! - `query` - Run a paged query
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Colonnade secondary-index tools.
#[derive(Parser)]
#[command(name = "colonnade")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump the physical records of a loaded fixture
    Records {
        /// Fixture file
        fixture: PathBuf,

        /// Only records of this sort key
        #[arg(short, long)]
        sort_key: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the scan plan compiled for a predicate
    Plan {
        /// Fixture file
        fixture: PathBuf,

        /// Collection to query
        #[arg(short, long)]
        collection: String,

        /// Predicate as JSON, e.g. '{"eq":{"field_name":"genre","value":"scifi"}}'
        #[arg(short, long, default_value = "\"any_match\"")]
        predicate: String,

        /// Scan this index instead of selecting one
        #[arg(short, long)]
        index: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run a paged query
    Query {
        /// Fixture file
        fixture: PathBuf,

        /// Collection to query
        #[arg(short, long)]
        collection: String,

        /// Predicate as JSON
        #[arg(short, long, default_value = "\"any_match\"")]
        predicate: String,

        /// Scan this index instead of selecting one
        #[arg(short, long)]
        index: Option<String>,

        /// Page size (0 for the default)
        #[arg(short, long, default_value = "0")]
        limit: usize,

        /// Resume after this document id
        #[arg(short, long)]
        start_from: Option<String>,

        /// Follow cursors until the scan is exhausted
        #[arg(short, long)]
        all: bool,

        /// Check the result against a filtered full scan
        #[arg(long)]
        verify: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Records {
            fixture,
            sort_key,
            format,
        } => {
            commands::records::run(&fixture, sort_key.as_deref(), &format)?;
        }
        Commands::Plan {
            fixture,
            collection,
            predicate,
            index,
            format,
        } => {
            commands::plan::run(&fixture, &collection, &predicate, index.as_deref(), &format)?;
        }
        Commands::Query {
            fixture,
            collection,
            predicate,
            index,
            limit,
            start_from,
            all,
            verify,
        } => {
            let options = commands::query::QueryOptions {
                index,
                limit,
                start_from,
                all,
                verify,
            };
            commands::query::run(&fixture, &collection, &predicate, &options)?;
        }
        Commands::Version => {
            println!("Colonnade CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Colonnade Core v{}", colonnade_core::VERSION);
        }
    }

    Ok(())
}
