//! Block reward split and payout history.
//!
//! The owner fee comes off the top; the rest is split pro rata by share
//! count with integer division. Whatever the division leaves over goes to
//! the owner as well, so the amounts always add up to the reward. A round
//! with no shares pays the whole reward to the owner.

use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::api_client::types::{Payment, RoundPayout};
use crate::shares::RoundShares;

/// Number of closed rounds kept for the status API.
pub const HISTORY_LEN: usize = 100;

/// Reward split before addresses are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    /// Fee plus rounding remainder.
    pub owner: u64,
    /// Per login, in login order.
    pub miners: Vec<(String, u64)>,
}

pub fn calc_payments(reward: u64, shares: &RoundShares, owner_fee_percent: u64) -> Split {
    if shares.total == 0 {
        return Split {
            owner: reward,
            miners: Vec::new(),
        };
    }

    let fee = (reward as u128 * owner_fee_percent.min(100) as u128 / 100) as u64;
    let distributable = reward - fee;

    let miners: Vec<(String, u64)> = shares
        .per_login
        .iter()
        .map(|(login, &count)| {
            let amount = count as u128 * distributable as u128 / shares.total as u128;
            (login.clone(), amount as u64)
        })
        .collect();

    let paid: u64 = miners.iter().map(|(_, amount)| amount).sum();
    Split {
        owner: reward - paid,
        miners,
    }
}

/// Bounded list of closed rounds, newest last.
#[derive(Default)]
pub struct PayoutHistory {
    rounds: Mutex<VecDeque<RoundPayout>>,
}

impl PayoutHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, payout: RoundPayout) {
        let mut rounds = self.rounds.lock();
        if rounds.len() == HISTORY_LEN {
            rounds.pop_front();
        }
        rounds.push_back(payout);
    }

    pub fn rounds(&self) -> Vec<RoundPayout> {
        self.rounds.lock().iter().cloned().collect()
    }
}

/// Attach payout addresses to a split. Logins without a known address
/// are paid to the owner.
pub fn resolve(
    split: Split,
    owner_address: &str,
    address_of: impl Fn(&str) -> Option<String>,
) -> (u64, Vec<Payment>) {
    let mut owner = split.owner;
    let mut payments = Vec::with_capacity(split.miners.len());
    for (login, amount) in split.miners {
        match address_of(&login) {
            Some(address) => payments.push(Payment {
                login,
                address,
                amount,
            }),
            None => owner += amount,
        }
    }
    if owner > 0 {
        payments.push(Payment {
            login: String::new(),
            address: owner_address.to_string(),
            amount: owner,
        });
    }
    (owner, payments)
}
