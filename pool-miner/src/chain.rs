//! Interfaces to the daemon the pool is embedded in.
//!
//! The pool consumes block templates, chain queries and the proof-of-work
//! hash from the blockchain storage, and hands solved blocks back through a
//! separate acceptance hook. Neither side is implemented here; see
//! [`crate::devnet`] for an in-memory stand-in.

use thiserror::Error;

use crate::block::Block;
use crate::protocol::HeightInfo;
use crate::types::{Difficulty, Hash};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("failed to create block template: {0}")]
    Template(String),

    #[error("no block at height {0}")]
    MissingBlock(u64),

    #[error("chain query failed: {0}")]
    Query(String),
}

/// Template as produced by the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTemplate {
    pub block: Block,
    pub difficulty: Difficulty,
    pub height: u64,
}

/// One block of the main chain with its scratchpad contribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBlock {
    pub height: u64,
    pub id: Hash,
    pub prev_id: Hash,
    pub scratchpad_increment: Vec<Hash>,
}

impl ChainBlock {
    pub fn height_info(&self) -> HeightInfo {
        HeightInfo::new(self.height, self.id)
    }
}

/// Blockchain storage as seen by the pool.
///
/// Heights are zero-based. `get_current_height` returns the number of blocks
/// in the main chain, so the top block sits at `get_current_height() - 1` and
/// a fresh template is built for height `get_current_height()`.
pub trait Blockchain: Send + Sync {
    /// Build a block candidate paying `miner_address`, with `extra_data`
    /// placed in the miner transaction's reserved region.
    fn create_block_template(
        &self,
        miner_address: &str,
        extra_data: &[u8],
    ) -> Result<BlockTemplate, ChainError>;

    fn get_block_id_by_height(&self, height: u64) -> Option<Hash>;

    /// Up to `count` main-chain blocks starting at `start_height`.
    fn get_blocks(&self, start_height: u64, count: usize) -> Result<Vec<ChainBlock>, ChainError>;

    fn get_current_height(&self) -> u64;

    /// Authoritative scratchpad together with the top block it reflects.
    fn get_scratchpad(&self) -> Result<(HeightInfo, Vec<Hash>), ChainError>;

    /// Proof-of-work hash of `block` at `height` over `scratchpad`.
    fn get_block_longhash(&self, block: &Block, height: u64, scratchpad: &[Hash]) -> Hash;

    fn check_hash(&self, hash: &Hash, difficulty: Difficulty) -> bool {
        difficulty.is_met_by(hash)
    }
}

/// Hook that submits a solved block to the daemon.
pub trait BlockAcceptor: Send + Sync {
    /// Returns whether the daemon accepted the block onto its chain.
    fn handle_block_found(&self, block: &Block) -> bool;
}
