//! Block candidate model.
//!
//! The pool never interprets consensus rules; it only needs enough structure
//! to stamp the per-session reservation into the miner transaction, patch the
//! nonce a miner found, and derive the hashing blob handed out as a job.
//!
//! # Hashing blob layout
//!
//! ```text
//! offset  size  field
//! 0       1     major version
//! 1       1     minor version
//! 2       8     timestamp (LE)
//! 10      32    previous block id
//! 42      8     nonce (LE)           <- miners iterate this field
//! 50      32    transaction tree hash
//! 82      8     transaction count (LE)
//! ```

pub mod reservation;

use serde::{Deserialize, Serialize};

use crate::types::Hash;

pub use reservation::{ReservationError, SessionStamp};

/// Byte offset of the nonce inside the hashing blob.
pub const NONCE_OFFSET: usize = 42;

/// Block header fields covered by the hashing blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub major_version: u8,
    pub minor_version: u8,
    pub timestamp: u64,
    pub prev_id: Hash,
    pub nonce: u64,
}

/// One output of the miner (coinbase) transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub amount: u64,
    pub address: String,
}

/// Extra field of the miner transaction.
///
/// `reserved` is the region the daemon leaves blank when building a template
/// for the pool; see [`SessionStamp`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerExtra {
    pub reserved: Vec<u8>,
}

/// Miner (coinbase) transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerTransaction {
    pub height: u64,
    pub outputs: Vec<TxOut>,
    pub extra: MinerExtra,
}

impl MinerTransaction {
    fn serialize_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.height.to_le_bytes());
        buf.extend_from_slice(&(self.outputs.len() as u64).to_le_bytes());
        for out in &self.outputs {
            buf.extend_from_slice(&out.amount.to_le_bytes());
            buf.extend_from_slice(&(out.address.len() as u32).to_le_bytes());
            buf.extend_from_slice(out.address.as_bytes());
        }
        buf.extend_from_slice(&(self.extra.reserved.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.extra.reserved);
    }

    /// Hash of the serialized transaction.
    pub fn hash(&self) -> Hash {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        Hash::digest(&[&buf])
    }
}

/// A block candidate (template) or a solved block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub miner_tx: MinerTransaction,
    pub tx_hashes: Vec<Hash>,
}

impl Block {
    /// Root over the miner transaction and all other transaction hashes.
    pub fn tree_hash(&self) -> Hash {
        let miner = self.miner_tx.hash();
        let mut parts: Vec<&[u8]> = Vec::with_capacity(1 + self.tx_hashes.len());
        parts.push(miner.as_bytes());
        for h in &self.tx_hashes {
            parts.push(h.as_bytes());
        }
        Hash::digest(&parts)
    }

    /// Serialized blob the miner hashes (see module docs for the layout).
    pub fn hashing_blob(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(90);
        blob.push(self.header.major_version);
        blob.push(self.header.minor_version);
        blob.extend_from_slice(&self.header.timestamp.to_le_bytes());
        blob.extend_from_slice(self.header.prev_id.as_bytes());
        blob.extend_from_slice(&self.header.nonce.to_le_bytes());
        blob.extend_from_slice(self.tree_hash().as_bytes());
        blob.extend_from_slice(&(1 + self.tx_hashes.len() as u64).to_le_bytes());
        blob
    }

    /// Block identifier.
    pub fn id(&self) -> Hash {
        Hash::digest(&[&self.hashing_blob()])
    }

    /// Total reward paid by the miner transaction.
    pub fn reward(&self) -> u64 {
        self.miner_tx
            .outputs
            .iter()
            .fold(0u64, |acc, out| acc.saturating_add(out.amount))
    }

    /// Copy of this block with `nonce` in the header.
    pub fn with_nonce(&self, nonce: u64) -> Self {
        let mut block = self.clone();
        block.header.nonce = nonce;
        block
    }
}
