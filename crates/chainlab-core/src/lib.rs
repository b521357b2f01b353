pub mod chain;
pub mod codec;
pub mod constants;
pub mod error;
pub mod input;
pub mod repair;
pub mod session;

use serde::{Deserialize, Serialize};

pub use error::{ChainError, FormatError};

pub type Hash = [u8; 32];

/// One link of the didactic chain. `hash` is cached and must be refreshed
/// with [`Block::rehash`] after any field changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub prev_hash: String,
    pub timestamp: u64,
    pub data: String,
    pub nonce: u32,
    pub hash: String,
}

impl Block {
    pub fn new(index: u64, prev_hash: String, timestamp: u64, data: String) -> Self {
        let mut block = Self {
            index,
            prev_hash,
            timestamp,
            data,
            nonce: 0,
            hash: String::new(),
        };
        block.rehash();
        block
    }

    pub fn compute_hash(&self) -> String {
        hex::encode(pow::sha256d(&codec::block_bytes(self)))
    }

    pub fn rehash(&mut self) {
        self.hash = self.compute_hash();
    }

    /// True when the cached hash still matches the block's fields.
    pub fn is_hash_consistent(&self) -> bool {
        self.hash == self.compute_hash()
    }

    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        pow::meets_difficulty(&self.hash, difficulty)
    }
}

/// Fixed fields of a real block header used by the miner. Hash-like fields
/// are kept in display (big-endian hex) order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub name: String,
    pub height: Option<u64>,
    pub version: u32,
    pub prev_block: String,
    pub merkle_root: String,
    pub timestamp: u32,
    pub bits: u32,
}

pub mod pow {
    use super::{Block, Hash};
    use sha2::{Digest, Sha256};

    /// SHA-256 applied twice, as in Bitcoin header hashing.
    pub fn sha256d(bytes: &[u8]) -> Hash {
        let first = Sha256::digest(bytes);
        Sha256::digest(first).into()
    }

    /// Explorer-style rendering of a header digest (byte-reversed hex).
    pub fn display_hash(digest: &Hash) -> String {
        let mut reversed = *digest;
        reversed.reverse();
        hex::encode(reversed)
    }

    /// True iff the first `difficulty` characters of `hex` are all `'0'`.
    pub fn meets_difficulty(hex: &str, difficulty: usize) -> bool {
        hex.len() >= difficulty && hex.bytes().take(difficulty).all(|b| b == b'0')
    }

    pub fn leading_zero_digits(hex: &str) -> usize {
        hex.bytes().take_while(|b| *b == b'0').count()
    }

    /// Mine the block by incrementing the nonce until its hash has at least
    /// `difficulty` leading zero hex digits, giving up after `max_tries`.
    /// On exhaustion the block is returned with the last hash it computed.
    pub fn mine_block(mut block: Block, difficulty: usize, max_tries: u64) -> Block {
        if block.meets_difficulty(difficulty) {
            return block;
        }
        for _ in 0..max_tries {
            block.nonce = block.nonce.wrapping_add(1);
            block.rehash();
            if block.meets_difficulty(difficulty) {
                break;
            }
        }
        block
    }
}
