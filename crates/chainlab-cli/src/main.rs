//! `chainlab`: hash-chain integrity and proof-of-work mining demos.
mod chain_demo;
mod console;
mod fetch;
mod miner;
mod render;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "chainlab")]
#[command(about = "Interactive demos of hash-chain integrity and proof-of-work mining")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a small chain, tamper with it and repair it by hand
    Chain(chain_demo::ChainArgs),
    /// Mine a real Bitcoin header by typing nonces against the clock
    Mine(miner::MineArgs),
    /// Download real block headers into a JSON file
    Fetch(fetch::FetchArgs),
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // logs go to stderr so they never interleave with the drawn chain
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Chain(args) => chain_demo::run(args).await?,
        Command::Mine(args) => return miner::run(args).await,
        Command::Fetch(args) => fetch::run(args).await?,
    }
    Ok(ExitCode::SUCCESS)
}
