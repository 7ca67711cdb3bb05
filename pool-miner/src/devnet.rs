//! In-memory development chain.
//!
//! Implements [`Blockchain`] and [`BlockAcceptor`] without any consensus
//! rules beyond "extends the tip and meets the difficulty". Used by the test
//! suite and by the standalone daemon, where no real blockchain storage is
//! attached.
//!
//! Each non-genesis block contributes [`INCREMENT_PER_BLOCK`] scratchpad
//! hashes derived from its id, and the long hash mixes a few scratchpad
//! entries selected by the intermediate hash, so it genuinely depends on the
//! scratchpad a miner holds.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

use crate::block::{Block, BlockHeader, MinerExtra, MinerTransaction, TxOut};
use crate::chain::{BlockAcceptor, BlockTemplate, Blockchain, ChainBlock, ChainError};
use crate::protocol::HeightInfo;
use crate::tracing::prelude::*;
use crate::types::{Difficulty, Hash};

pub const INCREMENT_PER_BLOCK: usize = 2;

const LONGHASH_ROUNDS: usize = 4;
const BLOCK_INTERVAL_SECS: u64 = 120;
const GENESIS_TIMESTAMP: u64 = 1_400_000_000;

#[derive(Debug, Clone)]
struct DevBlock {
    id: Hash,
    prev_id: Hash,
    increment: Vec<Hash>,
}

impl DevBlock {
    fn from_id(id: Hash, prev_id: Hash) -> Self {
        let increment = (0..INCREMENT_PER_BLOCK as u8)
            .map(|i| Hash::digest(&[id.as_bytes(), &[i]]))
            .collect();
        Self {
            id,
            prev_id,
            increment,
        }
    }
}

#[derive(Debug)]
struct DevState {
    blocks: Vec<DevBlock>,
    accepted: Vec<Block>,
    difficulty: Difficulty,
    salt: u64,
}

impl DevState {
    fn top(&self) -> HeightInfo {
        // Genesis is always present
        let height = self.blocks.len() as u64 - 1;
        HeightInfo::new(height, self.blocks[height as usize].id)
    }

    fn push_synthetic(&mut self) {
        let prev = self.top();
        let id = Hash::digest(&[
            b"devnet",
            &(prev.height + 1).to_le_bytes(),
            &self.salt.to_le_bytes(),
        ]);
        self.blocks.push(DevBlock::from_id(id, prev.block_id));
    }

    fn scratchpad(&self) -> Vec<Hash> {
        self.blocks
            .iter()
            .skip(1)
            .flat_map(|b| b.increment.iter().copied())
            .collect()
    }
}

pub struct DevChain {
    state: Mutex<DevState>,
    reward: u64,
    fail_templates: AtomicBool,
    tip_tx: watch::Sender<u64>,
}

impl DevChain {
    /// Chain holding only a genesis block.
    pub fn new(difficulty: Difficulty, reward: u64) -> Self {
        let genesis = DevBlock {
            id: Hash::digest(&[b"devnet genesis"]),
            prev_id: Hash::ZERO,
            increment: Vec::new(),
        };
        let (tip_tx, _) = watch::channel(0);
        Self {
            state: Mutex::new(DevState {
                blocks: vec![genesis],
                accepted: Vec::new(),
                difficulty,
                salt: 0,
            }),
            reward,
            fail_templates: AtomicBool::new(false),
            tip_tx,
        }
    }

    /// Chain with `count` blocks on top of genesis, at difficulty 1000.
    pub fn with_blocks(count: u64) -> Self {
        let chain = Self::new(Difficulty::from(1000), 1_000_000);
        chain.mine_blocks(count);
        chain
    }

    /// Append synthetic blocks, as if mined elsewhere.
    pub fn mine_blocks(&self, count: u64) {
        let top = {
            let mut state = self.state.lock();
            for _ in 0..count {
                state.push_synthetic();
            }
            state.top()
        };
        self.notify_tip(top.height);
    }

    /// Replace the top `depth` blocks with a competing branch of equal length.
    pub fn reorganize(&self, depth: u64) {
        let top = {
            let mut state = self.state.lock();
            let keep = (state.blocks.len() as u64).saturating_sub(depth).max(1);
            state.blocks.truncate(keep as usize);
            state.salt += 1;
            for _ in 0..depth {
                state.push_synthetic();
            }
            state.top()
        };
        self.notify_tip(top.height);
    }

    pub fn set_difficulty(&self, difficulty: Difficulty) {
        self.state.lock().difficulty = difficulty;
    }

    /// Make subsequent `create_block_template` calls fail.
    pub fn fail_templates(&self, fail: bool) {
        self.fail_templates.store(fail, Ordering::SeqCst);
    }

    /// Receiver that changes whenever the tip moves.
    pub fn tip_notifications(&self) -> watch::Receiver<u64> {
        self.tip_tx.subscribe()
    }

    /// Blocks accepted through [`BlockAcceptor::handle_block_found`].
    pub fn accepted_blocks(&self) -> Vec<Block> {
        self.state.lock().accepted.clone()
    }

    pub fn top(&self) -> HeightInfo {
        self.state.lock().top()
    }

    fn notify_tip(&self, height: u64) {
        self.tip_tx.send_replace(height);
    }
}

impl Blockchain for DevChain {
    fn create_block_template(
        &self,
        miner_address: &str,
        extra_data: &[u8],
    ) -> Result<BlockTemplate, ChainError> {
        if self.fail_templates.load(Ordering::SeqCst) {
            return Err(ChainError::Template("template creation disabled".into()));
        }
        if miner_address.is_empty() {
            return Err(ChainError::Template("empty miner address".into()));
        }

        let state = self.state.lock();
        let top = state.top();
        let height = top.height + 1;
        let block = Block {
            header: BlockHeader {
                major_version: 1,
                minor_version: 0,
                timestamp: GENESIS_TIMESTAMP + height * BLOCK_INTERVAL_SECS,
                prev_id: top.block_id,
                nonce: 0,
            },
            miner_tx: MinerTransaction {
                height,
                outputs: vec![TxOut {
                    amount: self.reward,
                    address: miner_address.to_string(),
                }],
                extra: MinerExtra {
                    reserved: extra_data.to_vec(),
                },
            },
            tx_hashes: Vec::new(),
        };

        Ok(BlockTemplate {
            block,
            difficulty: state.difficulty,
            height,
        })
    }

    fn get_block_id_by_height(&self, height: u64) -> Option<Hash> {
        self.state
            .lock()
            .blocks
            .get(usize::try_from(height).ok()?)
            .map(|b| b.id)
    }

    fn get_blocks(&self, start_height: u64, count: usize) -> Result<Vec<ChainBlock>, ChainError> {
        let state = self.state.lock();
        let start = usize::try_from(start_height)
            .map_err(|_| ChainError::Query(format!("height {start_height} out of range")))?;
        Ok(state
            .blocks
            .iter()
            .enumerate()
            .skip(start)
            .take(count)
            .map(|(height, b)| ChainBlock {
                height: height as u64,
                id: b.id,
                prev_id: b.prev_id,
                scratchpad_increment: b.increment.clone(),
            })
            .collect())
    }

    fn get_current_height(&self) -> u64 {
        self.state.lock().blocks.len() as u64
    }

    fn get_scratchpad(&self) -> Result<(HeightInfo, Vec<Hash>), ChainError> {
        let state = self.state.lock();
        Ok((state.top(), state.scratchpad()))
    }

    fn get_block_longhash(&self, block: &Block, height: u64, scratchpad: &[Hash]) -> Hash {
        // Only the part of the scratchpad that existed below `height` counts.
        let usable = scratchpad
            .len()
            .min((height.saturating_sub(1) as usize).saturating_mul(INCREMENT_PER_BLOCK));
        let mut hash = Hash::digest(&[&block.hashing_blob()]);
        if usable == 0 {
            return hash;
        }
        for _ in 0..LONGHASH_ROUNDS {
            let mut word = [0u8; 8];
            word.copy_from_slice(&hash.as_bytes()[..8]);
            let index = (u64::from_le_bytes(word) % usable as u64) as usize;
            hash = Hash::digest(&[hash.as_bytes(), scratchpad[index].as_bytes()]);
        }
        hash
    }
}

impl BlockAcceptor for DevChain {
    fn handle_block_found(&self, block: &Block) -> bool {
        let top = {
            let mut state = self.state.lock();
            let top = state.top();
            let height = top.height + 1;
            if block.header.prev_id != top.block_id || block.miner_tx.height != height {
                warn!(height, "Rejecting block that does not extend the tip");
                return false;
            }

            let scratchpad = state.scratchpad();
            let hash = self.get_block_longhash(block, height, &scratchpad);
            if !self.check_hash(&hash, state.difficulty) {
                warn!(height, %hash, "Rejecting block below difficulty");
                return false;
            }

            state.blocks.push(DevBlock::from_id(block.id(), top.block_id));
            state.accepted.push(block.clone());
            state.top()
        };
        info!(height = top.height, id = %top.block_id, "Block accepted");
        self.notify_tip(top.height);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::SessionStamp;

    #[test]
    fn test_heights_and_ids() {
        let chain = DevChain::with_blocks(3);
        assert_eq!(chain.get_current_height(), 4);
        assert_eq!(chain.top().height, 3);

        let blocks = chain.get_blocks(1, 10).unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].prev_id, chain.get_block_id_by_height(0).unwrap());
        assert_eq!(blocks[2].id, chain.top().block_id);
        assert_eq!(chain.get_block_id_by_height(4), None);
    }

    #[test]
    fn test_scratchpad_grows_per_block() {
        let chain = DevChain::with_blocks(3);
        let (top, pad) = chain.get_scratchpad().unwrap();
        assert_eq!(top.height, 3);
        assert_eq!(pad.len(), 3 * INCREMENT_PER_BLOCK);
    }

    #[test]
    fn test_template_builds_on_tip() {
        let chain = DevChain::with_blocks(2);
        let template = chain
            .create_block_template("owner", &SessionStamp::reserve())
            .unwrap();
        assert_eq!(template.height, 3);
        assert_eq!(template.block.header.prev_id, chain.top().block_id);
        assert_eq!(template.block.reward(), 1_000_000);
        assert_eq!(template.block.miner_tx.extra.reserved, SessionStamp::reserve());
    }

    #[test]
    fn test_template_failure_switch() {
        let chain = DevChain::with_blocks(1);
        chain.fail_templates(true);
        assert!(chain.create_block_template("owner", &[]).is_err());
        chain.fail_templates(false);
        assert!(chain.create_block_template("owner", &[]).is_ok());
    }

    #[test]
    fn test_longhash_depends_on_scratchpad() {
        let chain = DevChain::with_blocks(4);
        let template = chain.create_block_template("owner", &[]).unwrap();
        let (_, pad) = chain.get_scratchpad().unwrap();

        let a = chain.get_block_longhash(&template.block, template.height, &pad);
        let mut altered = pad.clone();
        for h in altered.iter_mut() {
            *h = Hash::ZERO;
        }
        let b = chain.get_block_longhash(&template.block, template.height, &altered);
        assert_ne!(a, b);
    }

    #[test]
    fn test_accepts_only_valid_blocks() {
        let chain = DevChain::new(Difficulty::from(1), 50);
        chain.mine_blocks(1);
        let mut tips = chain.tip_notifications();
        let template = chain.create_block_template("owner", &[]).unwrap();

        let mut stale = template.block.clone();
        stale.header.prev_id = Hash::ZERO;
        assert!(!chain.handle_block_found(&stale));

        // Difficulty 1 accepts any hash
        assert!(chain.handle_block_found(&template.block));
        assert_eq!(chain.top().height, 2);
        assert_eq!(chain.top().block_id, template.block.id());
        assert_eq!(chain.accepted_blocks().len(), 1);
        assert!(tips.has_changed().unwrap());
    }

    #[test]
    fn test_reorganize_keeps_height() {
        let chain = DevChain::with_blocks(5);
        let before = chain.top();
        let shared = chain.get_block_id_by_height(3).unwrap();

        chain.reorganize(2);

        assert_eq!(chain.top().height, before.height);
        assert_ne!(chain.top().block_id, before.block_id);
        assert_eq!(chain.get_block_id_by_height(3), Some(shared));
    }
}
