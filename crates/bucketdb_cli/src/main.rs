//! bucketdb CLI
//!
//! Command-line access to a bucketdb database file.
//!
//! # Commands
//!
//! - `put`, `get`, `delete` - Single documents
//! - `all`, `prefix`, `range` - Stream a bucket, optionally through `--filter`
//! - `buckets` - List every bucket path
//! - `backup` - Write a consistent copy of the database
//! - `size` - Print the stored size in bytes

mod commands;
mod output;

use bucketdb_core::{Db, Query};
use clap::{Parser, Subcommand};
use output::Format;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Store and query JSON documents in nested buckets.
#[derive(Parser)]
#[command(name = "bucketdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database file
    #[arg(global = true, short, long, default_value = "default.db")]
    db: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Output format
    #[arg(global = true, short, long, value_enum, default_value_t = Format::Json)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a JSON object under a key
    Put {
        /// Dot-separated bucket path, created if missing
        bucket: String,
        /// Key within the bucket
        key: String,
        /// The document, as a JSON object
        json: String,
    },

    /// Print the document stored under a key
    Get {
        /// Dot-separated bucket path
        bucket: String,
        /// Key within the bucket
        key: String,
    },

    /// Remove a key
    Delete {
        /// Dot-separated bucket path
        bucket: String,
        /// Key within the bucket
        key: String,
    },

    /// Print every document in a bucket
    All {
        /// Dot-separated bucket path
        bucket: String,
        /// Only print documents matching this expression
        #[arg(long)]
        filter: Option<String>,
    },

    /// Print the documents whose key starts with a prefix
    Prefix {
        /// Dot-separated bucket path
        bucket: String,
        /// Key prefix
        prefix: String,
        /// Only print documents matching this expression
        #[arg(long)]
        filter: Option<String>,
    },

    /// Print the documents whose key lies between two keys, inclusive
    Range {
        /// Dot-separated bucket path
        bucket: String,
        /// First key
        start: String,
        /// Last key
        end: String,
        /// Only print documents matching this expression
        #[arg(long)]
        filter: Option<String>,
    },

    /// List every bucket path
    Buckets,

    /// Write a consistent copy of the database to a file
    Backup {
        /// Where to write the copy
        output: PathBuf,
    },

    /// Print the stored size in bytes
    Size,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the JSON output.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("bucketdb CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("bucketdb core v{}", bucketdb_core::VERSION);
        return Ok(());
    }

    let db = Db::open(&cli.db)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let result = run(&db, cli.command, cli.format, &mut out);
    db.close()?;
    result
}

fn run<W: Write>(
    db: &Db,
    command: Commands,
    format: Format,
    out: &mut W,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Put { bucket, key, json } => commands::docs::put(db, &bucket, &key, &json)?,
        Commands::Get { bucket, key } => commands::docs::get(db, &bucket, &key, format, out)?,
        Commands::Delete { bucket, key } => commands::docs::delete(db, &bucket, &key)?,
        Commands::All { bucket, filter } => {
            commands::query::run(db, Query::all(bucket), filter.as_deref(), format, out)?;
        }
        Commands::Prefix {
            bucket,
            prefix,
            filter,
        } => {
            let query = Query::prefix(bucket, prefix);
            commands::query::run(db, query, filter.as_deref(), format, out)?;
        }
        Commands::Range {
            bucket,
            start,
            end,
            filter,
        } => {
            let query = Query::range(bucket, start, end);
            commands::query::run(db, query, filter.as_deref(), format, out)?;
        }
        Commands::Buckets => commands::admin::buckets(db, format, out)?,
        Commands::Backup { output } => commands::admin::backup(db, &output, out)?,
        Commands::Size => commands::admin::size(db, out)?,
        Commands::Version => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_the_subcommand() {
        let cli = Cli::parse_from([
            "bucketdb", "range", "test.bucket", "1", "3", "--filter", ".key > 1", "--db", "x.db",
            "--format", "json-pretty",
        ]);
        assert_eq!(cli.db, PathBuf::from("x.db"));
        assert_eq!(cli.format, Format::JsonPretty);
        assert!(matches!(
            cli.command,
            Commands::Range { ref filter, .. } if filter.as_deref() == Some(".key > 1")
        ));
    }

    #[test]
    fn database_path_and_format_have_defaults() {
        let cli = Cli::parse_from(["bucketdb", "buckets"]);
        assert_eq!(cli.db, PathBuf::from("default.db"));
        assert_eq!(cli.format, Format::Json);

        let cli = Cli::parse_from(["bucketdb", "-f", "yaml", "size"]);
        assert_eq!(cli.format, Format::Yaml);
    }

    #[test]
    fn run_dispatches_to_commands() {
        let db = Db::open_in_memory();
        let mut out = Vec::new();
        run(
            &db,
            Commands::Put {
                bucket: "a.b".into(),
                key: "k".into(),
                json: r#"{"x": true}"#.into(),
            },
            Format::Json,
            &mut out,
        )
        .unwrap();
        run(&db, Commands::Buckets, Format::Json, &mut out).unwrap();
        run(
            &db,
            Commands::All {
                bucket: "a.b".into(),
                filter: Some(".x".into()),
            },
            Format::Json,
            &mut out,
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[\"a\",\"a.b\"]\n{\"key\":\"k\",\"value\":{\"x\":true}}\n"
        );
    }
}
