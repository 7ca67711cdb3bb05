//! Share ledger for the current payout round.
//!
//! One mutex guards the committed hash set and the per-login tally, so the
//! duplicate check and the insert happen in a single critical section.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

use crate::types::Hash;

/// Result of offering a share to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    Accepted,
    Duplicate,
}

/// Share counts of a round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundShares {
    pub number: u64,
    pub total: u64,
    pub per_login: BTreeMap<String, u64>,
}

#[derive(Debug)]
struct Round {
    number: u64,
    /// Committed hashes and who submitted them.
    hashes: HashMap<Hash, String>,
    tally: BTreeMap<String, u64>,
    total: u64,
}

impl Round {
    fn new(number: u64) -> Self {
        Self {
            number,
            hashes: HashMap::new(),
            tally: BTreeMap::new(),
            total: 0,
        }
    }

    fn shares(&self) -> RoundShares {
        RoundShares {
            number: self.number,
            total: self.total,
            per_login: self.tally.clone(),
        }
    }
}

pub struct ShareLedger {
    round: Mutex<Round>,
}

impl Default for ShareLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ShareLedger {
    pub fn new() -> Self {
        Self {
            round: Mutex::new(Round::new(1)),
        }
    }

    /// Commit `hash` for `login` unless it is already in this round.
    pub fn try_commit(&self, hash: Hash, login: &str) -> Commit {
        let mut round = self.round.lock();
        if round.hashes.contains_key(&hash) {
            return Commit::Duplicate;
        }
        round.hashes.insert(hash, login.to_string());
        *round.tally.entry(login.to_string()).or_default() += 1;
        round.total += 1;
        Commit::Accepted
    }

    /// Who committed `hash`, if anyone did this round.
    pub fn submitter(&self, hash: &Hash) -> Option<String> {
        self.round.lock().hashes.get(hash).cloned()
    }

    /// Number of committed hashes in the current round.
    pub fn len(&self) -> usize {
        self.round.lock().hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn current(&self) -> RoundShares {
        self.round.lock().shares()
    }

    /// Finish the current round and start an empty one.
    pub fn close_round(&self) -> RoundShares {
        let mut round = self.round.lock();
        let next = Round::new(round.number + 1);
        std::mem::replace(&mut *round, next).shares()
    }
}
