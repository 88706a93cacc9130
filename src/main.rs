use std::fs;
use std::path::{Path, PathBuf};

use alloy::primitives::Address;
use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use pool_indexer::config::Config;
use pool_indexer::db_service::MemoryStore;
use pool_indexer::handlers::{EventProcessor, IndexedEvent};
use pool_indexer::sync::{read_prices, resolve_metadata};
use pool_indexer::utils::app_context::AppContext;
use pool_indexer::utils::logger::setup_logger;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines event log and print the resulting entities
    Replay {
        file: PathBuf,
    },
    /// Show the price oracle in effect at a block, and optionally a token's price from it
    Oracle {
        chain: u64,
        block: u64,
        #[arg(long)]
        token: Option<Address>,
    },
    /// Resolve a token's metadata, through the cache
    Token {
        chain: u64,
        address: Address,
    },
}

fn read_event_log(file: &Path) -> Result<Vec<IndexedEvent>> {
    let content = fs::read_to_string(file)
        .wrap_err_with(|| format!("Failed to read event log {}", file.display()))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str(line).wrap_err_with(|| format!("Invalid event on line {}", number + 1))
        })
        .collect()
}

async fn replay(ctx: AppContext, file: &Path) -> Result<()> {
    let events = read_event_log(file)?;
    let processor = EventProcessor::new(ctx);
    let mut store = MemoryStore::new();
    processor.process_all(&mut store, &events).await?;
    println!("{}", serde_json::to_string_pretty(&store)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env()?;
    setup_logger(config.log_level)?;
    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Replay { file } => replay(ctx, &file).await?,
        Commands::Oracle {
            chain,
            block,
            token,
        } => {
            let version = ctx.chains.select_oracle_version(chain, block)?;
            let address = ctx.chains.oracle_address(chain, version)?;
            println!("Oracle {version} at {address} on chain {chain} at block {block}");
            if let Some(token) = token {
                let (price, _) = read_prices(&ctx, chain, token, block).await?;
                println!("{token}: {price}");
            }
        }
        Commands::Token { chain, address } => {
            let details = resolve_metadata(&ctx, chain, address).await?;
            println!("{}", serde_json::to_string_pretty(&details)?);
        }
    }

    Ok(())
}
