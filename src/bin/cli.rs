//! flatkv CLI
//!
//! Command-line interface for a single flatkv store file.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use flatkv::{MatchSet, MatchSpec, ScanItem, SelectMode, Store, StoreConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// flatkv CLI
#[derive(Parser, Debug)]
#[command(name = "flatkv")]
#[command(about = "Sorted key-value store in a single text file")]
#[command(version)]
struct Args {
    /// Store file (created if absent)
    #[arg(short, long, default_value = "./flatkv.db")]
    file: String,

    /// Permission bits applied to the store file (octal)
    #[arg(long, default_value = "644", value_parser = parse_mode)]
    mode: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Print records whose value matches
    Select {
        /// Comma-separated terms that must all match; repeat for OR
        #[arg(short, long = "match", required = true)]
        matches: Vec<String>,

        /// Print keys only
        #[arg(long, conflicts_with = "values")]
        keys: bool,

        /// Print values only
        #[arg(long)]
        values: bool,

        /// Match regardless of ASCII case
        #[arg(short, long)]
        ignore_case: bool,

        /// Read the file directly instead of through grep
        #[arg(long)]
        no_prefilter: bool,
    },

    /// Remove every record
    Reset,
}

fn parse_mode(s: &str) -> Result<u32, String> {
    u32::from_str_radix(s, 8).map_err(|e| format!("invalid octal mode {:?}: {}", s, e))
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,flatkv=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> flatkv::Result<ExitCode> {
    let no_prefilter = matches!(args.command, Commands::Select { no_prefilter: true, .. });
    let config = StoreConfig::builder()
        .mode(args.mode)
        .prefilter(!no_prefilter)
        .build();

    let mut store = Store::open(&args.file, config)?;
    let mut out = io::stdout().lock();

    let code = match args.command {
        Commands::Get { key } => match store.get(key.as_bytes())? {
            Some(value) => {
                out.write_all(&value)?;
                out.write_all(b"\n")?;
                ExitCode::SUCCESS
            }
            None => ExitCode::from(1),
        },
        Commands::Put { key, value } => {
            store.put(key.as_bytes(), value.as_bytes())?;
            ExitCode::SUCCESS
        }
        Commands::Del { key } => {
            if store.del(key.as_bytes())? {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Commands::Select {
            matches,
            keys,
            values,
            ignore_case,
            ..
        } => {
            let spec = MatchSpec::new(matches.iter().map(|m| MatchSet::all(m.split(','))));
            let mode = if keys {
                SelectMode::Keys
            } else if values {
                SelectMode::Values
            } else {
                SelectMode::Pairs
            };

            store.begin(&spec, mode, !ignore_case)?;
            while let Some(item) = store.next()? {
                match item {
                    ScanItem::Pair(k, v) => {
                        out.write_all(&k)?;
                        out.write_all(b"\t")?;
                        out.write_all(&v)?;
                    }
                    ScanItem::Key(k) => out.write_all(&k)?,
                    ScanItem::Value(v) => out.write_all(&v)?,
                }
                out.write_all(b"\n")?;
            }
            store.end()?;
            ExitCode::SUCCESS
        }
        Commands::Reset => {
            store.reset()?;
            ExitCode::SUCCESS
        }
    };

    store.close()?;
    Ok(code)
}
