//! Command-line driver for the FundMe ledger
//!
//! Deploys the ledger (and a mock feed on local networks), funds it from
//! named accounts, withdraws as the owner, and serves a price feed for the
//! live adapter.

use clap::{Parser, Subcommand};
use fundme::deploy::{NetworkConfig, NetworkError, NetworkRegistry, FUND_ME_NAME};
use fundme::harness::{Harness, HarnessError, DEPLOYER};
use fundme::identity::Address;
use fundme::ledger::{format_ether, format_usd};
use fundme::oracle::{MockPriceFeed, OracleError, PriceFeedServer, DECIMALS, INITIAL_ANSWER};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fundme")]
#[command(about = "FundMe - crowdfunding ledger with an oracle-gated minimum", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding accounts, deployments and ledger state
    #[arg(long, global = true, default_value = ".fundme")]
    data_dir: PathBuf,

    /// Network to operate on
    #[arg(long, global = true, default_value = "hardhat")]
    network: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List named accounts and their native balances
    Accounts {
        /// Number of accounts to show (created on demand)
        #[arg(short = 'n', long, default_value_t = 6)]
        count: usize,
    },

    /// Deploy the mock feed (local networks) and the ledger
    Deploy {
        /// `host:port` of the live feed server (public networks)
        #[arg(long)]
        feed_endpoint: Option<String>,
    },

    /// Contribute to the ledger
    Fund {
        #[arg(long, default_value = DEPLOYER)]
        from: String,

        /// Amount in ether
        #[arg(long, default_value = "0.3")]
        value: String,
    },

    /// Withdraw everything to the owner
    Withdraw {
        #[arg(long, default_value = DEPLOYER)]
        from: String,
    },

    /// Show ledger state
    Status,

    /// Publish a new answer on the mock feed
    SetPrice {
        /// Price scaled by the feed's decimals
        #[arg(long, allow_hyphen_values = true)]
        answer: i128,
    },

    /// Serve a fixed-answer price feed over TCP
    ServeFeed {
        #[arg(long, default_value = "127.0.0.1:8546")]
        bind: String,

        #[arg(long, default_value_t = DECIMALS)]
        decimals: u8,

        #[arg(long, default_value_t = INITIAL_ANSWER, allow_hyphen_values = true)]
        answer: i128,

        /// Feed address to report (defaults to the network's configured feed)
        #[arg(long)]
        feed_address: Option<String>,
    },
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Harness(#[from] HarnessError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("Invalid address: {0}")]
    Address(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// COMMANDS
// ============================================================================

fn accounts(harness: &Harness, count: usize) -> Result<(), CliError> {
    for account in harness.accounts(count)? {
        println!(
            "{:<10} {}  {} ETH",
            account.label,
            account.address,
            format_ether(account.balance)
        );
    }
    Ok(())
}

async fn deploy(harness: &Harness, feed_endpoint: Option<String>) -> Result<(), CliError> {
    let summary = harness.deploy(feed_endpoint.as_deref()).await?;
    println!("{} deployed at {}", FUND_ME_NAME, summary.record.address);
    println!("price feed: {}", summary.price_feed);
    Ok(())
}

async fn fund(harness: &Harness, from: &str, value: &str) -> Result<(), CliError> {
    let receipt = harness.fund(from, value).await?;
    println!(
        "Funded {} ETH from {}. Balance in contract: {} ETH",
        format_ether(receipt.amount),
        receipt.funder,
        format_ether(receipt.balance)
    );
    Ok(())
}

async fn withdraw(harness: &Harness, from: &str) -> Result<(), CliError> {
    let receipt = harness.withdraw(from).await?;
    println!(
        "Withdrawal complete: {} ETH to {} ({} funders cleared)",
        format_ether(receipt.amount),
        receipt.owner,
        receipt.funders_cleared
    );
    Ok(())
}

async fn status(harness: &Harness) -> Result<(), CliError> {
    let status = harness.status().await?;

    println!("network:      {}", status.network);
    println!("owner:        {}", status.owner);
    println!("price feed:   {}", status.price_feed);
    println!(
        "price:        {} USD (round {})",
        format_usd(status.price_usd),
        status.round.round_id
    );
    println!(
        "minimum:      {} USD ({} ETH)",
        format_usd(status.minimum_usd),
        format_ether(status.minimum_contribution)
    );
    println!("held:         {} ETH", format_ether(status.held));
    println!("funders:      {}", status.funders.len());
    for (index, (funder, amount)) in status.funders.iter().enumerate() {
        println!("  [{}] {}  {} ETH", index, funder, format_ether(*amount));
    }
    Ok(())
}

fn set_price(harness: &Harness, answer: i128) -> Result<(), CliError> {
    let round = harness.set_price(answer)?;
    println!("Mock feed answer set to {} (round {})", round.answer, round.round_id);
    Ok(())
}

async fn serve_feed(
    network: &NetworkConfig,
    bind: &str,
    decimals: u8,
    answer: i128,
    feed_address: Option<String>,
) -> Result<(), CliError> {
    let address = match feed_address {
        Some(s) => Address::parse(&s).map_err(|e| CliError::Address(e.to_string()))?,
        None => network.eth_usd_price_feed.unwrap_or(Address::ZERO),
    };

    let feed = Arc::new(MockPriceFeed::new(address, decimals, answer));
    let server = PriceFeedServer::bind(bind, feed).await?;
    println!("Serving feed {} on {}", address, server.endpoint());

    tokio::signal::ctrl_c().await?;
    info!("Shutting down price feed server");
    server.shutdown();
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    if let Err(e) = run(cli).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    if let Commands::ServeFeed {
        bind,
        decimals,
        answer,
        feed_address,
    } = &cli.command
    {
        let network = NetworkRegistry::builtin().get(&cli.network)?.clone();
        return serve_feed(&network, bind, *decimals, *answer, feed_address.clone()).await;
    }

    let harness = Harness::open(&cli.data_dir, &cli.network)?;

    match cli.command {
        Commands::Accounts { count } => accounts(&harness, count),
        Commands::Deploy { feed_endpoint } => deploy(&harness, feed_endpoint).await,
        Commands::Fund { from, value } => fund(&harness, &from, &value).await,
        Commands::Withdraw { from } => withdraw(&harness, &from).await,
        Commands::Status => status(&harness).await,
        Commands::SetPrice { answer } => set_price(&harness, answer),
        Commands::ServeFeed { .. } => Ok(()),
    }
}
