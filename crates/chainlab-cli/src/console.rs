use std::io::{self, Write};

use chainlab_core::{
    constants::POLL_INTERVAL,
    input::LineInput,
    pow::leading_zero_digits,
    session::{SessionEvent, SessionObserver, SessionOutcome},
};
use crossterm::style::Stylize;

use crate::render::zeros;

/// Audible alert. Terminals that do not beep just ignore the BEL.
#[derive(Clone, Copy, Debug, Default)]
pub struct Bell;

impl Bell {
    pub fn ring(&self) {
        let mut out = io::stdout();
        let _ = out.write_all(b"\x07").and_then(|()| out.flush());
    }
}

fn show(text: impl std::fmt::Display) {
    let mut out = io::stdout();
    let _ = writeln!(out, "{text}");
    let _ = out.flush();
}

/// Print `text` and wait for one line. Returns `None` once stdin is closed.
pub async fn prompt(input: &mut LineInput, text: &str) -> Option<String> {
    let mut out = io::stdout();
    let _ = write!(out, "{text}");
    let _ = out.flush();
    input
        .wait_line(POLL_INTERVAL)
        .await
        .map(|line| line.trim().to_string())
}

/// Prints session events as they happen. Sessions over a chain block are
/// labelled with that block.
pub struct ConsoleObserver {
    label: String,
    difficulty: usize,
    verbose: bool,
    bell: Bell,
    alerts: u32,
}

impl ConsoleObserver {
    pub fn new(label: impl Into<String>, difficulty: usize, verbose: bool) -> Self {
        Self {
            label: label.into(),
            difficulty,
            verbose,
            bell: Bell,
            alerts: 0,
        }
    }

    fn alert(&mut self) {
        self.alerts += 1;
        self.bell.ring();
    }

    fn attempt_line(&self, nonce: u32, hash: &str) -> String {
        format!(
            "  nonce {nonce}: {hash} ({} leading zeros)",
            leading_zero_digits(hash)
        )
    }
}

impl SessionObserver for ConsoleObserver {
    fn on_event(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Started { duration, block } => {
                if let Some(index) = block {
                    self.label = format!("Block {index}");
                }
                show(format!(
                    "[{}] You have {}s. Type a nonce and press ENTER ('exit' gives up).",
                    self.label,
                    duration.as_secs()
                ));
            }
            SessionEvent::Countdown { remaining_secs } => {
                self.alert();
                show(format!("  {remaining_secs}s left").yellow());
            }
            SessionEvent::ValidationNotice { input } => show(format!(
                "  '{input}' is not a nonce: use a decimal integer from 0 to {}.",
                u32::MAX
            )),
            SessionEvent::AlreadySolved { nonce } => show(format!(
                "  Nonce {nonce} already produced a valid hash. Try another one."
            )),
            SessionEvent::Miss { nonce, hash } => {
                if self.verbose {
                    show(self.attempt_line(*nonce, hash));
                } else {
                    show(format!("  nonce {nonce}: no match"));
                }
            }
            SessionEvent::Hit { nonce, hash } => {
                self.alert();
                if self.verbose {
                    show(self.attempt_line(*nonce, hash));
                }
                show(
                    format!(
                        "  nonce {nonce} meets the target ({}...)",
                        zeros(self.difficulty)
                    )
                    .green(),
                );
            }
            SessionEvent::Finished { outcome } => match outcome {
                SessionOutcome::Succeeded => {}
                SessionOutcome::TimedOut => show(format!("[{}] Time is up.", self.label).yellow()),
                SessionOutcome::Cancelled => show(format!("[{}] Cancelled.", self.label)),
            },
        }
    }
}
