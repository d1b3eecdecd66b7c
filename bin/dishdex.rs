use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dishdex::{CatalogRecord, DishdexError, IndexConfig, IndexManager};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "dishdex")]
#[command(about = "Catalog search index", long_about = None)]
struct Args {
    /// Data directory holding the commit log and writer lock
    #[arg(long, env = "DISHDEX_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Maximum number of search results
    #[arg(long, env = "DISHDEX_MAX_RESULTS", default_value = "50")]
    max_results: usize,

    /// Remove a writer lock left behind by a crashed process before opening
    #[arg(long)]
    force_unlock: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index records from a JSON lines file ({"name", "category", "key"?} per line)
    Ingest { file: PathBuf },
    /// Run a ranked search and print the response as JSON
    Search { query: String },
    /// Delete the document stored under a key
    Delete { key: String },
    /// Print index statistics as JSON
    Stats,
}

fn read_records(path: &PathBuf) -> Result<(Vec<CatalogRecord>, usize)> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut records = Vec::new();
    let mut malformed = 0;

    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<CatalogRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                let err = DishdexError::InvalidInput(format!("line {}: {}", line_no + 1, e));
                warn!(error = %err, "skipping malformed record");
                malformed += 1;
            }
        }
    }
    Ok((records, malformed))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = IndexConfig::persistent(args.data_dir.clone()).with_max_results(args.max_results);

    if args.force_unlock {
        IndexManager::force_unlock(&config)?;
    }

    info!("Starting dishdex v{} on {}", dishdex::VERSION, args.data_dir.display());
    // reads never need the writer lock
    let index = match args.command {
        Command::Search { .. } | Command::Stats => IndexManager::open_read_only(config)?,
        Command::Ingest { .. } | Command::Delete { .. } => IndexManager::open(config)?,
    };

    match args.command {
        Command::Ingest { file } => {
            let (records, malformed) = read_records(&file)?;
            let receipt = index.index_batch(&records)?;
            println!(
                "{}",
                serde_json::json!({
                    "accepted": receipt.accepted,
                    "skipped": receipt.skipped,
                    "malformed": malformed,
                    "generation": receipt.generation,
                })
            );
        }
        Command::Search { query } => {
            let response = index.search(&query)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Delete { key } => {
            let deleted = index.delete(&key)?;
            let info = index.commit()?;
            println!(
                "{}",
                serde_json::json!({ "deleted": deleted, "generation": info.generation })
            );
        }
        Command::Stats => {
            println!("{}", serde_json::to_string_pretty(&index.stats())?);
        }
    }

    index.close()?;
    Ok(())
}
