//! Scratchpad store.
//!
//! The scratchpad is the auxiliary hash dataset the proof-of-work function
//! reads from. It grows by a few hashes per block, so a miner that is only
//! slightly behind is brought up to date with per-block addenda instead of a
//! full transfer.
//!
//! # Locking
//!
//! The store is a reader/writer lock around `{top, hashes}`. Share hashing
//! holds the shared side for the whole hash computation
//! ([`ScratchpadStore::with_snapshot`]) so it never observes a half-replaced
//! dataset. Only the template refresher writes, and only for the duration of
//! the swap or append itself.

use parking_lot::RwLock;
use thiserror::Error;

use crate::chain::{Blockchain, ChainError};
use crate::protocol::{Addendum, HeightInfo};
use crate::tracing::prelude::*;
use crate::types::Hash;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScratchpadError {
    #[error("gap from height {from} to {to} exceeds addendum limit of {limit} blocks")]
    GapTooLarge { from: u64, to: u64, limit: usize },

    #[error("chain returned inconsistent blocks: {0}")]
    Inconsistent(String),

    #[error("addendum for height {height} does not extend scratchpad top {top}")]
    NotContiguous { height: u64, top: u64 },

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Copy of the scratchpad with the block it reflects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScratchpadSnapshot {
    pub top: HeightInfo,
    pub hashes: Vec<Hash>,
}

/// How [`ScratchpadStore::resync`] brought the store up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncOutcome {
    Unchanged,
    Appended(usize),
    Replaced,
}

#[derive(Debug, Default)]
struct Scratchpad {
    /// Empty until the first load from the chain.
    loaded: bool,
    top: HeightInfo,
    hashes: Vec<Hash>,
}

impl Scratchpad {
    fn apply(&mut self, addendum: &Addendum) -> Result<(), ScratchpadError> {
        if addendum.hi.height != self.top.height + 1 || addendum.prev_id != self.top.block_id {
            return Err(ScratchpadError::NotContiguous {
                height: addendum.hi.height,
                top: self.top.height,
            });
        }
        self.hashes.extend_from_slice(&addendum.addm);
        self.top = addendum.hi;
        Ok(())
    }
}

pub struct ScratchpadStore {
    inner: RwLock<Scratchpad>,
    max_addendum_blocks: usize,
}

impl ScratchpadStore {
    pub fn new(max_addendum_blocks: usize) -> Self {
        Self {
            inner: RwLock::new(Scratchpad::default()),
            max_addendum_blocks,
        }
    }

    /// Copy the whole scratchpad together with its top block.
    pub fn full_copy(&self) -> ScratchpadSnapshot {
        let pad = self.inner.read();
        ScratchpadSnapshot {
            top: pad.top,
            hashes: pad.hashes.clone(),
        }
    }

    pub fn top(&self) -> HeightInfo {
        self.inner.read().top
    }

    pub fn len(&self) -> usize {
        self.inner.read().hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` over the scratchpad while holding the shared lock.
    pub fn with_snapshot<R>(&self, f: impl FnOnce(&[Hash]) -> R) -> R {
        let pad = self.inner.read();
        f(&pad.hashes)
    }

    /// Atomically swap in a new scratchpad.
    pub fn replace(&self, top: HeightInfo, hashes: Vec<Hash>) {
        let mut pad = self.inner.write();
        pad.loaded = true;
        pad.top = top;
        pad.hashes = hashes;
    }

    /// Apply addenda in order under one exclusive section.
    ///
    /// Either all addenda apply or the store is left unchanged.
    pub fn append(&self, addenda: &[Addendum]) -> Result<(), ScratchpadError> {
        let mut pad = self.inner.write();
        let rollback = (pad.top, pad.hashes.len());
        for addendum in addenda {
            if let Err(e) = pad.apply(addendum) {
                pad.top = rollback.0;
                pad.hashes.truncate(rollback.1);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Addenda that replay the chain from `from` up to `to_height`.
    ///
    /// Returns an empty list when the miner has no history (`height == 0`),
    /// is past `to_height`, or already holds the main-chain block at
    /// `to_height`. When the miner's block id at its claimed height disagrees
    /// with the main chain, the miner is assumed to share one block less and
    /// the replay starts a block earlier. This holds at the tip too, so a
    /// miner sitting on an orphaned tip gets the replacement block.
    pub fn diff(
        &self,
        chain: &dyn Blockchain,
        from: &HeightInfo,
        to_height: u64,
    ) -> Result<Vec<Addendum>, ScratchpadError> {
        if from.height == 0 || from.height > to_height {
            return Ok(Vec::new());
        }

        let mut height = from.height;
        if chain.get_block_id_by_height(height) != Some(from.block_id) {
            trace!(height, claimed = %from.block_id, "Claimed block not on main chain");
            height -= 1;
        }
        if height >= to_height {
            return Ok(Vec::new());
        }

        let count = (to_height - height) as usize;
        if count > self.max_addendum_blocks {
            return Err(ScratchpadError::GapTooLarge {
                from: height,
                to: to_height,
                limit: self.max_addendum_blocks,
            });
        }

        let base_id = chain
            .get_block_id_by_height(height)
            .ok_or(ChainError::MissingBlock(height))?;
        let blocks = chain.get_blocks(height + 1, count)?;
        if blocks.len() != count {
            return Err(ScratchpadError::Inconsistent(format!(
                "asked for {count} blocks from height {}, got {}",
                height + 1,
                blocks.len()
            )));
        }

        let mut expected = HeightInfo::new(height, base_id);
        let mut addenda = Vec::with_capacity(count);
        for block in blocks {
            if block.height != expected.height + 1 || block.prev_id != expected.block_id {
                return Err(ScratchpadError::Inconsistent(format!(
                    "block {} at height {} does not extend {}",
                    block.id, block.height, expected.block_id
                )));
            }
            expected = block.height_info();
            addenda.push(Addendum {
                hi: block.height_info(),
                prev_id: block.prev_id,
                addm: block.scratchpad_increment,
            });
        }
        Ok(addenda)
    }

    /// Bring the store up to the chain tip.
    ///
    /// Appends per-block addenda when the current top is still on the main
    /// chain and close enough; otherwise reloads the whole scratchpad.
    pub fn resync(&self, chain: &dyn Blockchain) -> Result<ResyncOutcome, ScratchpadError> {
        let (loaded, current) = {
            let pad = self.inner.read();
            (pad.loaded, pad.top)
        };
        let chain_top = chain.get_current_height().saturating_sub(1);

        let on_main_chain = chain.get_block_id_by_height(current.height) == Some(current.block_id);
        if loaded && on_main_chain {
            if current.height == chain_top {
                return Ok(ResyncOutcome::Unchanged);
            }
            if current.height > 0 && current.height < chain_top {
                match self
                    .diff(chain, &current, chain_top)
                    .and_then(|addenda| self.append(&addenda).map(|_| addenda.len()))
                {
                    Ok(n) if n as u64 == chain_top - current.height => {
                        debug!(from = current.height, to = chain_top, "Scratchpad extended");
                        return Ok(ResyncOutcome::Appended(n));
                    }
                    Ok(_) => {}
                    Err(e) => debug!(error = %e, "Incremental scratchpad update failed"),
                }
            }
        }

        let (top, hashes) = chain.get_scratchpad()?;
        debug!(height = top.height, entries = hashes.len(), "Scratchpad reloaded");
        self.replace(top, hashes);
        Ok(ResyncOutcome::Replaced)
    }
}
