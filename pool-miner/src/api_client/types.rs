//! API data transfer objects.
//!
//! These types define the API contract shared between the server and
//! clients.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Pool state snapshot.
#[derive(Clone, Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct PoolState {
    pub uptime_secs: u64,
    pub template: Option<TemplateState>,
    pub round: RoundState,
    pub session_count: usize,
    pub blocks_found: u64,
}

/// Currently published template.
#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct TemplateState {
    pub height: u64,
    pub version: u64,
    /// Hex id of the block the template builds on.
    pub prev_id: String,
    pub difficulty: u64,
    pub share_difficulty: u64,
}

/// Share tally of the open round.
#[derive(Clone, Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct RoundState {
    pub number: u64,
    pub total_shares: u64,
    pub shares: BTreeMap<String, u64>,
}

/// One connected, authenticated miner.
#[derive(Clone, Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct SessionSummary {
    pub id: u64,
    pub login: String,
    pub agent: String,
    pub peer: Option<String>,
    /// Height the miner was last synced to.
    pub last_height: u64,
    pub accepted_shares: u64,
    pub rejected_shares: u64,
}

/// A closed round and how its block reward was split.
#[derive(Clone, Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct RoundPayout {
    pub round: u64,
    pub height: u64,
    pub block_id: String,
    pub reward: u64,
    pub total_shares: u64,
    /// Fee, rounding remainder and unpayable shares.
    pub owner_amount: u64,
    pub payments: Vec<Payment>,
}

/// Amount owed to one address. The owner entry has an empty login.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct Payment {
    pub login: String,
    pub address: String,
    pub amount: u64,
}

/// Result of a credential reload.
#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct ReloadResult {
    pub logins: usize,
}
