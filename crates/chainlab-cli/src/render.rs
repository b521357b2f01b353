use std::io::{self, IsTerminal, Write};

use chainlab_core::{chain::ChainView, repair::RenderSink, Block, BlockHeader};
use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Color, Stylize},
    terminal::{Clear, ClearType},
};
use tracing::debug;

const RULE_WIDTH: usize = 72;
const BOX_WIDTH: usize = 78;

pub fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

pub fn zeros(difficulty: usize) -> String {
    if difficulty == 0 {
        "-".to_string()
    } else {
        "0".repeat(difficulty)
    }
}

/// Pad or cut `text` to exactly `width` characters.
fn fit(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count <= width {
        format!("{text}{}", " ".repeat(width - count))
    } else {
        let mut cut: String = text.chars().take(width.saturating_sub(3)).collect();
        cut.push_str("...");
        cut
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BoxState {
    Ok,
    Broken,
    Active,
}

fn block_box(block: &Block, state: BoxState, difficulty: usize) -> Vec<String> {
    let inner = BOX_WIDTH - 4;
    let (label, color) = match state {
        BoxState::Ok => ("OK", Color::Green),
        BoxState::Broken => ("BROKEN", Color::Red),
        BoxState::Active => ("EDITING", Color::Yellow),
    };
    let status = format!(
        "idx: {:<3}  ts: {:<10}  status: {:<7}  difficulty: {}",
        block.index, block.timestamp, label, difficulty
    );
    let rows = [
        status,
        format!("prev_hash: {}", block.prev_hash),
        format!("data     : {}", block.data),
        format!("nonce    : {}", block.nonce),
        format!("hash     : {}", block.hash),
    ];

    let edge = "-".repeat(BOX_WIDTH - 2);
    let mut lines = vec![format!("+{edge}+").with(color).to_string()];
    for (i, row) in rows.iter().enumerate() {
        let body = fit(row, inner);
        let body = if i == 0 { body.with(color).to_string() } else { body };
        lines.push(format!("| {body} |"));
    }
    lines.push(format!("+{edge}+").with(color).to_string());
    lines
}

pub fn status_line(view: &ChainView<'_>) -> String {
    match view.report.first_broken {
        Some(k) => format!("Chain broken from block {k}.").red().to_string(),
        None => "Chain intact.".green().to_string(),
    }
}

/// Draws the whole chain on every render; clears the screen first when
/// stdout is a terminal.
pub struct ChainScreen {
    fix_seconds: u64,
    clear: bool,
}

impl ChainScreen {
    pub fn new(fix_seconds: u64) -> Self {
        Self {
            fix_seconds,
            clear: io::stdout().is_terminal(),
        }
    }

    pub fn draw(&mut self, view: &ChainView<'_>) -> io::Result<()> {
        let mut out = io::stdout().lock();
        if self.clear {
            queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;
        }
        writeln!(out, "{}", rule())?;
        writeln!(out, "Chain integrity demo")?;
        writeln!(out, "{}", rule())?;
        writeln!(
            out,
            "Blocks: {} | Difficulty: {} (prefix {}) | Fix window: {}s",
            view.blocks.len(),
            view.difficulty,
            zeros(view.difficulty),
            self.fix_seconds
        )?;
        writeln!(out)?;

        for (i, block) in view.blocks.iter().enumerate() {
            let state = if view.active == Some(i) {
                BoxState::Active
            } else if view.report.statuses.get(i).is_some_and(|s| s.valid) {
                BoxState::Ok
            } else {
                BoxState::Broken
            };
            for line in block_box(block, state, view.difficulty) {
                writeln!(out, "{line}")?;
            }
        }
        writeln!(out)?;
        writeln!(out, "{}", status_line(view))?;
        writeln!(out)?;
        out.flush()
    }
}

impl RenderSink for ChainScreen {
    fn render(&mut self, view: &ChainView<'_>) {
        if let Err(err) = self.draw(view) {
            debug!(error = %err, "chain render failed");
        }
    }

    fn awaiting_confirmation(&mut self, index: usize) {
        let mut out = io::stdout();
        let _ = writeln!(out, "Block {index} fixed. Press ENTER to continue...")
            .and_then(|()| out.flush());
    }
}

pub fn header_text(header: &BlockHeader, source: &str, seconds: u64, difficulty: usize) -> String {
    let mut lines = vec![
        rule(),
        "Bitcoin mining simulator".to_string(),
        rule(),
        format!("Header source: {source}"),
        "Assigned block:".to_string(),
        format!("  Name:      {}", header.name),
    ];
    if let Some(height) = header.height {
        lines.push(format!("  Height:    {height}"));
    }
    lines.extend([
        format!("  Version:   {}", header.version),
        format!("  PrevHash:  {}", header.prev_block),
        format!("  Merkle:    {}", header.merkle_root),
        format!("  Timestamp: {} (epoch)", header.timestamp),
        format!("  Bits:      0x{:08x} ({})", header.bits, header.bits),
        String::new(),
        format!("Time limit: {seconds}s | Target prefix: {}", zeros(difficulty)),
    ]);
    lines.join("\n")
}
