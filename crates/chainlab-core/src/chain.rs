use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    constants::{
        BLOCK_INTERVAL_SECS, MAX_MINING_TRIES, SAMPLE_PAYLOADS, TAMPER_MARKER, ZERO_HASH_HEX,
    },
    error::ChainError,
    pow::{self, mine_block},
    Block,
};

/// Parameters a chain was built with, kept so it can be reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ChainParams {
    pub blocks: usize,
    pub difficulty: usize,
    pub seed: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BlockStatus {
    pub link_ok: bool,
    pub difficulty_ok: bool,
    /// Final verdict, poisoned by any earlier broken block.
    pub valid: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    pub statuses: Vec<BlockStatus>,
    pub first_broken: Option<usize>,
}

impl ChainReport {
    pub fn is_intact(&self) -> bool {
        self.first_broken.is_none()
    }
}

/// What a render sink receives: the whole chain plus the block being worked on.
#[derive(Clone, Debug)]
pub struct ChainView<'a> {
    pub blocks: &'a [Block],
    pub difficulty: usize,
    pub active: Option<usize>,
    pub report: ChainReport,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chain {
    params: ChainParams,
    blocks: Vec<Block>,
}

impl Chain {
    /// Build and mine `n` blocks with timestamps starting now.
    pub fn build(n: usize, difficulty: usize, seed: u64) -> Self {
        Self::build_at(n, difficulty, seed, unix_now())
    }

    /// Build and mine `n` blocks with timestamps `base_time + 60 * index`.
    pub fn build_at(n: usize, difficulty: usize, seed: u64, base_time: u64) -> Self {
        let params = ChainParams {
            blocks: n,
            difficulty,
            seed,
        };
        let mut blocks: Vec<Block> = Vec::with_capacity(n);
        for i in 0..n {
            let prev_hash = blocks
                .last()
                .map(|b| b.hash.clone())
                .unwrap_or_else(|| ZERO_HASH_HEX.to_string());
            let block = Block::new(
                i as u64,
                prev_hash,
                base_time + BLOCK_INTERVAL_SECS * i as u64,
                sample_payload(i, seed).to_string(),
            );
            let block = mine_block(block, difficulty, MAX_MINING_TRIES);
            if !block.meets_difficulty(difficulty) {
                warn!(index = i, difficulty, "mining gave up before meeting difficulty");
            }
            debug!(index = i, nonce = block.nonce, hash = %block.hash, "mined block");
            blocks.push(block);
        }
        info!(blocks = n, difficulty, "chain built");
        Self {
            params,
            blocks,
        }
    }

    /// Rebuild from scratch with the parameters it was built with.
    pub fn reset(&mut self) {
        let ChainParams {
            blocks,
            difficulty,
            seed,
        } = self.params;
        *self = Self::build(blocks, difficulty, seed);
    }

    pub fn difficulty(&self) -> usize {
        self.params.difficulty
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub(crate) fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Highest index that may be tampered with; the last block is protected.
    pub fn last_tamperable(&self) -> Option<usize> {
        self.blocks.len().checked_sub(2)
    }

    pub fn validate(&self) -> ChainReport {
        let difficulty = self.params.difficulty;
        let mut report = ChainReport {
            statuses: Vec::with_capacity(self.blocks.len()),
            first_broken: None,
        };
        for (i, block) in self.blocks.iter().enumerate() {
            let link_ok = i == 0 || block.prev_hash == self.blocks[i - 1].hash;
            let difficulty_ok = pow::meets_difficulty(&block.hash, difficulty);
            let valid = report.first_broken.is_none() && link_ok && difficulty_ok;
            if !valid && report.first_broken.is_none() {
                report.first_broken = Some(i);
            }
            report.statuses.push(BlockStatus {
                link_ok,
                difficulty_ok,
                valid,
            });
        }
        report
    }

    /// Replace a block's payload and rehash it without mining. `None` marks
    /// the existing payload as tampered.
    pub fn tamper(&mut self, index: usize, payload: Option<String>) -> Result<(), ChainError> {
        if self.last_tamperable().is_none_or(|last| index > last) {
            return Err(ChainError::Index {
                index,
                last: self.blocks.len().saturating_sub(1),
            });
        }
        let block = &mut self.blocks[index];
        block.data = payload.unwrap_or_else(|| format!("{}{TAMPER_MARKER}", block.data));
        block.rehash();
        info!(index, hash = %block.hash, "block tampered");
        Ok(())
    }

    pub fn view(&self, active: Option<usize>) -> ChainView<'_> {
        ChainView {
            blocks: &self.blocks,
            difficulty: self.params.difficulty,
            active,
            report: self.validate(),
        }
    }
}

pub fn sample_payload(index: usize, seed: u64) -> &'static str {
    let len = SAMPLE_PAYLOADS.len();
    let offset = (seed % len as u64) as usize;
    SAMPLE_PAYLOADS[(index + offset) % len]
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
