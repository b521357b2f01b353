use std::time::Duration;

use anyhow::Result;
use chainlab_core::{
    chain::Chain,
    input::LineInput,
    repair::{RenderSink, RepairOutcome, Repairer},
    session::SessionOutcome,
};
use clap::Args;
use crossterm::style::Stylize;
use tracing::info;

use crate::{
    console::{prompt, ConsoleObserver},
    render::ChainScreen,
};

#[derive(Args, Debug, Clone)]
pub struct ChainArgs {
    /// Number of blocks to build
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..=64))]
    pub blocks: u32,
    /// Leading zero hex digits every block hash must have
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(0..=64))]
    pub difficulty: u8,
    /// Seconds allowed to fix each block
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub fix_seconds: u64,
    /// Rotates the sample payloads
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

enum MenuChoice {
    View,
    Tamper,
    Reset,
    Quit,
    Unknown,
}

fn parse_choice(line: &str) -> MenuChoice {
    match line.trim().to_ascii_lowercase().as_str() {
        "" | "v" | "view" => MenuChoice::View,
        "t" | "tamper" => MenuChoice::Tamper,
        "r" | "reset" => MenuChoice::Reset,
        "q" | "quit" | "exit" => MenuChoice::Quit,
        _ => MenuChoice::Unknown,
    }
}

fn outcome_word(outcome: SessionOutcome) -> &'static str {
    match outcome {
        SessionOutcome::Succeeded => "solved",
        SessionOutcome::TimedOut => "time ran out",
        SessionOutcome::Cancelled => "cancelled",
    }
}

pub async fn run(args: ChainArgs) -> Result<()> {
    let fix_window = Duration::from_secs(args.fix_seconds);
    let mut chain = Chain::build(args.blocks as usize, usize::from(args.difficulty), args.seed);
    let mut screen = ChainScreen::new(args.fix_seconds);
    let mut input = LineInput::stdin();

    loop {
        screen.render(&chain.view(None));
        println!("Options:  [V]iew  [T]amper  [R]eset  [Q]uit");
        let Some(line) = prompt(&mut input, "> ").await else {
            break;
        };
        match parse_choice(&line) {
            MenuChoice::View => continue,
            MenuChoice::Quit => break,
            MenuChoice::Reset => {
                println!("Rebuilding the chain...");
                chain.reset();
            }
            MenuChoice::Unknown => println!("  Unknown option '{line}'."),
            MenuChoice::Tamper => {
                let open = tamper_flow(&mut chain, &mut screen, &mut input, fix_window).await?;
                if !open {
                    break;
                }
            }
        }
    }

    info!("chain demo finished");
    println!("Bye!");
    Ok(())
}

/// Returns `false` when stdin closed mid-flow.
async fn tamper_flow(
    chain: &mut Chain,
    screen: &mut ChainScreen,
    input: &mut LineInput,
    fix_window: Duration,
) -> Result<bool> {
    let Some(last) = chain.last_tamperable() else {
        println!("  Not enough blocks to tamper with; the last block is protected.");
        return Ok(true);
    };

    let index = loop {
        let text = format!("Block to tamper (0..={last}, the last block is protected): ");
        let Some(line) = prompt(input, &text).await else {
            return Ok(false);
        };
        match line.parse::<usize>() {
            Ok(index) if index <= last => break index,
            _ => println!("  Enter a number from 0 to {last}."),
        }
    };

    let current = chain
        .block(index)
        .map(|b| b.data.clone())
        .unwrap_or_default();
    let text = format!("New data (ENTER marks it as tampered, current: '{current}'): ");
    let Some(payload) = prompt(input, &text).await else {
        return Ok(false);
    };
    let payload = (!payload.is_empty()).then_some(payload);

    let notice = format!(
        "Block {index} will be tampered. Find a nonce within {}s per block.",
        fix_window.as_secs()
    );
    println!("{}", notice.yellow());
    let difficulty = chain.difficulty();
    let mut observer = ConsoleObserver::new(format!("Block {index}"), difficulty, false);
    let outcome = Repairer::new(input, screen, &mut observer, fix_window)
        .confirm_fixes()
        .tamper_and_repair(chain, index, payload)
        .await?;

    match outcome {
        RepairOutcome::Repaired => {
            println!("{}", "Chain repaired up to the last block.".green());
        }
        RepairOutcome::Interrupted { index, outcome } => {
            println!(
                "{}",
                format!("Repair stopped at block {index} ({}).", outcome_word(outcome)).yellow()
            );
        }
    }
    info!(?outcome, "tamper flow finished");

    Ok(prompt(input, "ENTER to continue...").await.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_accepts_letters_and_words() {
        assert!(matches!(parse_choice("V"), MenuChoice::View));
        assert!(matches!(parse_choice(""), MenuChoice::View));
        assert!(matches!(parse_choice(" t "), MenuChoice::Tamper));
        assert!(matches!(parse_choice("Reset"), MenuChoice::Reset));
        assert!(matches!(parse_choice("q"), MenuChoice::Quit));
        assert!(matches!(parse_choice("a"), MenuChoice::Unknown));
    }
}
