use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    chain::{Chain, ChainView},
    constants::POLL_INTERVAL,
    error::ChainError,
    input::LineInput,
    session::{
        NonceTarget, SessionConfig, SessionObserver, SessionOutcome, SessionReport,
        TimeboxedSession,
    },
};

/// Receives a snapshot after every state-changing step.
pub trait RenderSink {
    fn render(&mut self, view: &ChainView<'_>);

    /// Block `index` was re-proved and the repairer now waits for a line
    /// before moving on.
    fn awaiting_confirmation(&mut self, _index: usize) {}
}

impl RenderSink for () {
    fn render(&mut self, _view: &ChainView<'_>) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RepairOutcome {
    /// Every block from the tampered one to the tail is valid again.
    Repaired,
    /// The session for `index` ended without a valid nonce.
    Interrupted {
        index: usize,
        outcome: SessionOutcome,
    },
}

impl RepairOutcome {
    pub fn is_repaired(self) -> bool {
        self == RepairOutcome::Repaired
    }
}

/// One block of a chain as a search target; re-renders after each guess.
struct ChainSlot<'a, R: ?Sized> {
    chain: &'a mut Chain,
    index: usize,
    render: &'a mut R,
}

impl<R: RenderSink + ?Sized> NonceTarget for ChainSlot<'_, R> {
    fn try_nonce(&mut self, nonce: u32) -> String {
        let hash = self.chain.blocks_mut()[self.index].try_nonce(nonce);
        self.render.render(&self.chain.view(Some(self.index)));
        hash
    }
}

pub struct Repairer<'a, R: ?Sized, O: ?Sized> {
    input: &'a mut LineInput,
    render: &'a mut R,
    observer: &'a mut O,
    deadline_per_block: Duration,
    confirm_fixes: bool,
}

impl<'a, R, O> Repairer<'a, R, O>
where
    R: RenderSink + ?Sized,
    O: SessionObserver + ?Sized,
{
    pub fn new(
        input: &'a mut LineInput,
        render: &'a mut R,
        observer: &'a mut O,
        deadline_per_block: Duration,
    ) -> Self {
        Self {
            input,
            render,
            observer,
            deadline_per_block,
            confirm_fixes: false,
        }
    }

    /// Wait for a line after every block that gets a valid nonce.
    pub fn confirm_fixes(self) -> Self {
        Self {
            confirm_fixes: true,
            ..self
        }
    }

    /// Run one first-hit session over block `index`.
    pub async fn fix_block(
        &mut self,
        chain: &mut Chain,
        index: usize,
    ) -> Result<SessionReport, ChainError> {
        if index >= chain.len() {
            return Err(ChainError::NoSuchBlock {
                index,
                len: chain.len(),
            });
        }
        Ok(self.search(chain, index).await)
    }

    /// Re-link and re-prove every block after `start_index`, in order.
    pub async fn propagate_after_fix(
        &mut self,
        chain: &mut Chain,
        start_index: usize,
    ) -> RepairOutcome {
        let difficulty = chain.difficulty();
        for j in start_index.saturating_add(1)..chain.len() {
            let prev_hash = chain.blocks()[j - 1].hash.clone();
            let block = &mut chain.blocks_mut()[j];
            block.prev_hash = prev_hash;
            block.rehash();
            let still_valid = block.meets_difficulty(difficulty);
            self.render.render(&chain.view(Some(j)));

            if still_valid {
                info!(index = j, "relinked block still meets difficulty");
                continue;
            }

            let report = self.search(chain, j).await;
            if !report.outcome.is_success() {
                warn!(index = j, outcome = ?report.outcome, "cascade repair interrupted");
                return RepairOutcome::Interrupted {
                    index: j,
                    outcome: report.outcome,
                };
            }
        }
        info!(start_index, "cascade repair reached the tail");
        RepairOutcome::Repaired
    }

    /// Tamper with `index`, re-prove it, then cascade. Index errors are
    /// returned before the chain is touched.
    pub async fn tamper_and_repair(
        &mut self,
        chain: &mut Chain,
        index: usize,
        payload: Option<String>,
    ) -> Result<RepairOutcome, ChainError> {
        chain.tamper(index, payload)?;
        self.render.render(&chain.view(Some(index)));

        let report = self.search(chain, index).await;
        if !report.outcome.is_success() {
            warn!(index, outcome = ?report.outcome, "tampered block was not repaired");
            return Ok(RepairOutcome::Interrupted {
                index,
                outcome: report.outcome,
            });
        }
        Ok(self.propagate_after_fix(chain, index).await)
    }

    async fn search(&mut self, chain: &mut Chain, index: usize) -> SessionReport {
        let config =
            SessionConfig::first_hit(self.deadline_per_block, chain.difficulty()).for_block(index);
        let mut slot = ChainSlot {
            chain: &mut *chain,
            index,
            render: &mut *self.render,
        };
        let report = TimeboxedSession::new(config)
            .run(&mut slot, &mut *self.input, &mut *self.observer)
            .await;
        if self.confirm_fixes && report.outcome.is_success() {
            self.render.awaiting_confirmation(index);
            if self.input.wait_line(POLL_INTERVAL).await.is_none() {
                debug!(index, "input closed while waiting for confirmation");
            }
        }
        self.render.render(&chain.view(Some(index)));
        report
    }
}
