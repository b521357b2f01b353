use std::{collections::HashSet, time::Duration};

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::{
    codec::HeaderTemplate,
    constants::{ALERT_WINDOW_SECS, CANCEL_KEYWORDS, POLL_INTERVAL},
    input::LineInput,
    pow, Block,
};

/// Something whose digest depends on a nonce.
pub trait NonceTarget {
    /// Apply `nonce`, recompute the digest, and return the hex string the
    /// difficulty is checked against.
    fn try_nonce(&mut self, nonce: u32) -> String;
}

impl NonceTarget for Block {
    fn try_nonce(&mut self, nonce: u32) -> String {
        self.nonce = nonce;
        self.rehash();
        self.hash.clone()
    }
}

impl NonceTarget for HeaderTemplate {
    fn try_nonce(&mut self, nonce: u32) -> String {
        pow::display_hash(&pow::sha256d(self.set_nonce(nonce)))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SearchMode {
    /// Stop at the first nonce that meets the difficulty.
    FirstHit,
    /// Keep going until the deadline, recording every hit.
    Collect,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub duration: Duration,
    pub difficulty: usize,
    pub mode: SearchMode,
    /// Chain position being re-proved, when the target is a chain block.
    pub block: Option<usize>,
}

impl SessionConfig {
    pub fn first_hit(duration: Duration, difficulty: usize) -> Self {
        Self {
            duration,
            difficulty,
            mode: SearchMode::FirstHit,
            block: None,
        }
    }

    pub fn collect(duration: Duration, difficulty: usize) -> Self {
        Self {
            duration,
            difficulty,
            mode: SearchMode::Collect,
            block: None,
        }
    }

    pub fn for_block(self, index: usize) -> Self {
        Self {
            block: Some(index),
            ..self
        }
    }
}

/// Terminal state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SessionOutcome {
    Succeeded,
    TimedOut,
    Cancelled,
}

impl SessionOutcome {
    pub fn is_success(self) -> bool {
        self == SessionOutcome::Succeeded
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MiningAttemptRecord {
    pub nonce: u32,
    pub hash: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum SessionEvent {
    Started {
        duration: Duration,
        block: Option<usize>,
    },
    /// One of the final whole seconds has been reached.
    Countdown { remaining_secs: u64 },
    /// The line was not a decimal `u32`.
    ValidationNotice { input: String },
    /// The nonce already produced a hit in this session.
    AlreadySolved { nonce: u32 },
    Miss { nonce: u32, hash: String },
    Hit { nonce: u32, hash: String },
    Finished { outcome: SessionOutcome },
}

pub trait SessionObserver {
    fn on_event(&mut self, event: &SessionEvent);
}

impl SessionObserver for () {
    fn on_event(&mut self, _event: &SessionEvent) {}
}

impl SessionObserver for Vec<SessionEvent> {
    fn on_event(&mut self, event: &SessionEvent) {
        self.push(event.clone());
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    /// Nonces actually hashed. Rejected and duplicate lines do not count.
    pub attempts: u64,
    pub rejected: u64,
    pub duplicates: u64,
    pub hits: Vec<MiningAttemptRecord>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Candidate {
    Blank,
    Cancel,
    Nonce(u32),
    Invalid,
}

pub fn parse_candidate(line: &str) -> Candidate {
    let line = line.trim();
    if line.is_empty() {
        return Candidate::Blank;
    }
    if CANCEL_KEYWORDS
        .iter()
        .any(|k| line.eq_ignore_ascii_case(k))
    {
        return Candidate::Cancel;
    }
    if !line.bytes().all(|b| b.is_ascii_digit()) {
        return Candidate::Invalid;
    }
    line.parse::<u32>()
        .map(Candidate::Nonce)
        .unwrap_or(Candidate::Invalid)
}

/// Countdown alerts for the last few whole seconds, evaluated from the
/// remaining time on every poll rather than by a timer of its own.
#[derive(Clone, Copy, Debug)]
pub struct Countdown {
    next_at: u64,
}

impl Countdown {
    pub fn new(duration: Duration) -> Self {
        Self {
            next_at: ALERT_WINDOW_SECS.min(duration.as_secs()),
        }
    }

    /// Returns the whole second to announce, at most once per second.
    pub fn tick(&mut self, remaining: Duration) -> Option<u64> {
        if self.next_at == 0 || remaining.is_zero() || remaining > Duration::from_secs(self.next_at)
        {
            return None;
        }
        let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
        self.next_at = secs - 1;
        Some(secs)
    }
}

pub struct TimeboxedSession {
    config: SessionConfig,
    solved: HashSet<u32>,
    hits: Vec<MiningAttemptRecord>,
    attempts: u64,
    rejected: u64,
    duplicates: u64,
}

impl TimeboxedSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            solved: HashSet::new(),
            hits: Vec::new(),
            attempts: 0,
            rejected: 0,
            duplicates: 0,
        }
    }

    /// Drive the session to a terminal state. `input` is resumed on entry and
    /// stopped on exit so that late lines are not carried into the next
    /// session.
    pub async fn run<T, O>(
        mut self,
        target: &mut T,
        input: &mut LineInput,
        observer: &mut O,
    ) -> SessionReport
    where
        T: NonceTarget + ?Sized,
        O: SessionObserver + ?Sized,
    {
        let duration = self.config.duration;
        input.resume();
        let started = Instant::now();
        let mut countdown = Countdown::new(duration);
        observer.on_event(&SessionEvent::Started {
            duration,
            block: self.config.block,
        });

        let outcome = loop {
            let remaining = duration.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                break SessionOutcome::TimedOut;
            }
            if let Some(remaining_secs) = countdown.tick(remaining) {
                observer.on_event(&SessionEvent::Countdown { remaining_secs });
            }

            let Some(line) = input.next_line(POLL_INTERVAL.min(remaining)).await else {
                continue;
            };
            if started.elapsed() >= duration {
                debug!(%line, "line arrived after the deadline");
                break SessionOutcome::TimedOut;
            }
            if let Some(outcome) = self.handle_line(&line, target, observer) {
                break outcome;
            }
        };

        input.stop();
        observer.on_event(&SessionEvent::Finished { outcome });
        info!(
            ?outcome,
            block = ?self.config.block,
            attempts = self.attempts,
            hits = self.hits.len(),
            "search session finished"
        );
        SessionReport {
            outcome,
            attempts: self.attempts,
            rejected: self.rejected,
            duplicates: self.duplicates,
            hits: self.hits,
        }
    }

    fn handle_line<T, O>(
        &mut self,
        line: &str,
        target: &mut T,
        observer: &mut O,
    ) -> Option<SessionOutcome>
    where
        T: NonceTarget + ?Sized,
        O: SessionObserver + ?Sized,
    {
        match parse_candidate(line) {
            Candidate::Blank => None,
            Candidate::Cancel => Some(SessionOutcome::Cancelled),
            Candidate::Invalid => {
                self.rejected += 1;
                observer.on_event(&SessionEvent::ValidationNotice {
                    input: line.trim().to_string(),
                });
                None
            }
            Candidate::Nonce(nonce) => self.try_nonce(nonce, target, observer),
        }
    }

    fn try_nonce<T, O>(
        &mut self,
        nonce: u32,
        target: &mut T,
        observer: &mut O,
    ) -> Option<SessionOutcome>
    where
        T: NonceTarget + ?Sized,
        O: SessionObserver + ?Sized,
    {
        if self.solved.contains(&nonce) {
            self.duplicates += 1;
            observer.on_event(&SessionEvent::AlreadySolved { nonce });
            return None;
        }

        let hash = target.try_nonce(nonce);
        self.attempts += 1;
        debug!(nonce, %hash, "nonce attempt");

        if !pow::meets_difficulty(&hash, self.config.difficulty) {
            observer.on_event(&SessionEvent::Miss { nonce, hash });
            return None;
        }

        self.solved.insert(nonce);
        self.hits.push(MiningAttemptRecord {
            nonce,
            hash: hash.clone(),
        });
        observer.on_event(&SessionEvent::Hit { nonce, hash });
        match self.config.mode {
            SearchMode::FirstHit => Some(SessionOutcome::Succeeded),
            SearchMode::Collect => None,
        }
    }
}
