//! logcask CLI
//!
//! Command-line access to a store directory.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use logcask::{BootstrapReport, CaskError, Config, Store};
use tracing_subscriber::{fmt, EnvFilter};

/// logcask CLI
#[derive(Parser, Debug)]
#[command(name = "logcask")]
#[command(about = "Embedded log-structured key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./logcask_data")]
    data_dir: String,

    /// Recency cache capacity (keys)
    #[arg(short, long, default_value = "100")]
    cache_capacity: usize,

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

    /// Rebuild the index from the record log
    Rebuild,

    /// Compare the index with the record log
    Verify,

    /// Print store statistics
    Stats,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,logcask=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .cache_capacity(args.cache_capacity)
        .verify_on_open(matches!(args.command, Commands::Verify))
        .build();

    // Opening always rebuilds the index, so `verify` inspects what bootstrap
    // found in the persisted index before replacing it
    let (store, report) = match Store::open_with_report(config) {
        Ok(opened) => opened,
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let code = match run(&store, &report, args.command) {
        Ok(code) => code,
        Err(e) if e.is_corruption() => {
            tracing::error!("{} (run `logcask rebuild` to restore consistency)", e);
            ExitCode::from(3)
        }
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    };

    if let Err(e) = store.close() {
        tracing::error!("Failed to close store: {}", e);
        return ExitCode::FAILURE;
    }
    code
}

fn run(store: &Store, report: &BootstrapReport, command: Commands) -> Result<ExitCode, CaskError> {
    match command {
        Commands::Get { key } => match store.get(&key) {
            Ok(value) => println!("{}", value),
            Err(CaskError::KeyNotFound) => {
                eprintln!("(not found)");
                return Ok(ExitCode::from(2));
            }
            Err(e) => return Err(e),
        },
        Commands::Put { key, value } => {
            store.put(&key, &value)?;
            println!("OK");
        }
        Commands::Rebuild => {
            let stats = store.rebuild_index()?;
            println!(
                "rebuilt: {} records, {} keys, {} malformed",
                stats.records,
                store.key_count(),
                stats.malformed
            );
        }
        Commands::Verify => {
            let persisted = report.verification.clone().unwrap_or_default();
            let live = store.verify()?;
            if report.truncated_bytes > 0 {
                println!("torn tail: {} bytes truncated", report.truncated_bytes);
            }
            if persisted.is_consistent() && live.is_consistent() {
                println!("consistent: {} keys", store.key_count());
            } else {
                println!(
                    "inconsistent: {} missing, {} stale, {} unknown",
                    persisted.missing.len(),
                    persisted.stale.len(),
                    persisted.unknown.len()
                );
                return Ok(ExitCode::from(3));
            }
        }
        Commands::Stats => {
            let cache = store.cache_stats();
            println!("data dir:  {}", store.data_dir().display());
            println!("keys:      {}", store.key_count());
            println!("log bytes: {}", store.log_len());
            println!("cached:    {}/{}", store.cache().len(), store.cache().capacity());
            println!("hits:      {}", cache.hits);
            println!("misses:    {}", cache.misses);
            println!("hit ratio: {:.2}", store.cache().stats().hit_ratio());
        }
    }
    Ok(ExitCode::SUCCESS)
}
