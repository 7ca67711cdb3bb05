//! Typed request and response payloads.

use serde::{Deserialize, Serialize};

use crate::types::{Difficulty, Hash};

/// A miner's claim of where the chain is: a height and the block id it
/// believes sits at that height.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightInfo {
    pub height: u64,
    pub block_id: Hash,
}

impl HeightInfo {
    pub fn new(height: u64, block_id: Hash) -> Self {
        Self { height, block_id }
    }
}

/// Scratchpad increment contributed by one block, with enough chain context
/// for the miner to verify it extends its local view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addendum {
    pub hi: HeightInfo,
    pub prev_id: Hash,
    pub addm: Vec<Hash>,
}

/// Work handed to a miner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDetails {
    /// Hex-encoded hashing blob with the session stamp embedded.
    pub blob: String,
    /// Share-level difficulty.
    pub difficulty: Difficulty,
    #[serde(default)]
    pub job_id: String,
    /// The block this job builds on.
    pub prev_hi: HeightInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub pass: String,
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub hi: HeightInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginResponse {
    pub status: String,
    pub id: String,
    pub job: JobDetails,
    pub addms: Vec<Addendum>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetJobRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub hi: HeightInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetJobResponse {
    pub jd: JobDetails,
    pub addms: Vec<Addendum>,
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetFullScratchpadRequest {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetFullScratchpadResponse {
    pub hi: HeightInfo,
    pub scratchpad_hex: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitShareRequest {
    #[serde(default)]
    pub id: String,
    pub nonce: u64,
    #[serde(default)]
    pub job_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitShareResponse {
    pub status: String,
}
