//! timestore CLI
//!
//! Command-line interface over a file-backed expiring store.

use clap::{Parser, Subcommand};
use serde_json::Value;
use timestore::{Config, ExpireAt, ExpiringStore, FileStorage, OpResult, Ttl};
use tracing_subscriber::{fmt, EnvFilter};

/// timestore CLI
#[derive(Parser, Debug)]
#[command(name = "timestore-cli")]
#[command(about = "Key-value store with per-entry expiration")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./timestore_data")]
    data_dir: String,

    /// Keep expired entries when a read finds them
    #[arg(long)]
    keep_expired: bool,

    /// Storage quota in KB
    #[arg(short, long, default_value = "5120")]
    quota_kb: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Set a key-value pair (default lifetime: 2 hours)
    Set {
        /// The key to set
        key: String,

        /// The value to set (parsed as JSON when valid, else stored as text)
        value: String,

        /// Absolute expiry: RFC 3339 date or epoch milliseconds
        #[arg(long)]
        at: Option<String>,

        /// Day count (multiplies with hours and minutes)
        #[arg(long)]
        days: Option<u64>,

        /// Hour count (multiplies with days and minutes)
        #[arg(long)]
        hours: Option<u64>,

        /// Minute count (multiplies with days and hours)
        #[arg(long)]
        minutes: Option<u64>,

        /// Never expire
        #[arg(long, conflicts_with_all = ["at", "days", "hours", "minutes"])]
        never: bool,
    },

    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Delete a key
    Rm {
        /// The key to delete
        key: String,
    },

    /// Delete every expired entry
    Purge,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,timestore=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: Args) -> timestore::Result<i32> {
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .delete_expired_on_read(!args.keep_expired)
        .quota_bytes(args.quota_kb * 1024)
        .build();

    let storage = FileStorage::open(config.clone())?;
    let store = ExpiringStore::new(storage, &config);

    let result = match args.command {
        Commands::Set {
            key,
            value,
            at,
            days,
            hours,
            minutes,
            never,
        } => {
            let ttl = if never {
                Ttl::never()
            } else {
                Ttl {
                    time: at.as_deref().map(ExpireAt::parse).transpose()?,
                    day: days,
                    hours,
                    minutes,
                    never: false,
                }
            };
            store.put(&key, parse_value(&value), ttl)
        }
        Commands::Get { key } => store.get(&key),
        Commands::Rm { key } => store.remove(&key),
        Commands::Purge => {
            let purged = store.purge_expired()?;
            println!("purged {}", purged);
            store.storage().sync()?;
            return Ok(0);
        }
    };

    store.storage().sync()?;
    print_result(&result);

    Ok(if result.is_success() { 0 } else { 2 })
}

fn parse_value(input: &str) -> Value {
    serde_json::from_str(input).unwrap_or_else(|_| Value::String(input.to_owned()))
}

fn print_result(result: &OpResult) {
    match &result.value {
        Some(Value::String(text)) => println!("{} {}", result.status, text),
        Some(value) => println!("{} {}", result.status, value),
        None => println!("{}", result.status),
    }

    if let Some(detail) = &result.detail {
        eprintln!("{}", detail);
    }
}
