use std::{path::PathBuf, process::ExitCode, time::Duration};

use anyhow::Result;
use chainlab_core::{
    codec::HeaderTemplate,
    input::LineInput,
    session::{SessionConfig, SessionReport, TimeboxedSession},
};
use chainlab_headers::load_random_header;
use clap::Args;
use tracing::{error, info};

use crate::{
    console::{prompt, ConsoleObserver},
    render::{header_text, rule, zeros},
};

/// Exit status when the header file cannot be used.
const DATA_SOURCE_FAILURE: u8 = 2;

#[derive(Args, Debug, Clone)]
pub struct MineArgs {
    /// JSON list of block headers to mine against
    #[arg(long, default_value = "blocks.json")]
    pub headers: PathBuf,
    /// Length of the mining session in seconds
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub seconds: u64,
    /// Leading zero hex digits a hash needs to count as a hit
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=64))]
    pub difficulty: u8,
    /// Print the hash of every attempt
    #[arg(long)]
    pub verbose: bool,
}

pub async fn run(args: MineArgs) -> Result<ExitCode> {
    let difficulty = usize::from(args.difficulty);
    let header = match load_random_header(&args.headers, &mut rand::thread_rng()) {
        Ok(header) => header,
        Err(err) => {
            error!(path = %args.headers.display(), error = %err, "cannot load headers");
            eprintln!("Error loading '{}': {err}", args.headers.display());
            return Ok(ExitCode::from(DATA_SOURCE_FAILURE));
        }
    };
    let mut template = HeaderTemplate::new(&header)?;
    info!(name = %header.name, height = ?header.height, "header assigned");

    let source = args.headers.display().to_string();
    println!("{}", header_text(&header, &source, args.seconds, difficulty));
    println!();
    println!("Rules:");
    println!(
        "  1) You have {}s to enter nonces (0 to {}).",
        args.seconds,
        u32::MAX
    );
    println!("  2) Every attempt computes SHA256d(header) with your nonce.");
    println!("  3) Hashes starting with {} are recorded.", zeros(difficulty));
    println!();

    let mut input = LineInput::stdin();
    if prompt(&mut input, "Press ENTER to start the clock...").await.is_none() {
        println!();
        println!("No input; nothing was mined.");
        return Ok(ExitCode::SUCCESS);
    }

    let config = SessionConfig::collect(Duration::from_secs(args.seconds), difficulty);
    let mut observer = ConsoleObserver::new("Miner", difficulty, args.verbose);
    let report = TimeboxedSession::new(config)
        .run(&mut template, &mut input, &mut observer)
        .await;

    print_summary(&report, difficulty);
    Ok(ExitCode::SUCCESS)
}

fn print_summary(report: &SessionReport, difficulty: usize) {
    println!();
    println!("{}", rule());
    println!("Total attempts: {}", report.attempts);
    println!(
        "Hits (hashes starting with {}): {}",
        zeros(difficulty),
        report.hits.len()
    );
    println!("{}", "-".repeat(72));
    if report.hits.is_empty() {
        println!("No hash met the target.");
    } else {
        println!("{:<14} Hash", "Nonce");
        println!("{}", "-".repeat(72));
        for hit in &report.hits {
            println!("{:<14} {}", hit.nonce, hit.hash);
        }
    }
    println!("{}", "-".repeat(72));
    println!("Note: real Bitcoin does not count zeros; a hash must be below");
    println!("the target encoded in the `bits` field.");
}
