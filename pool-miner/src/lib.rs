//! Builtin mining pool for a CryptoNote-style daemon.
//!
//! Miners connect over TCP, log in, receive jobs stamped with their session
//! id and submit shares. Shares are verified against the scratchpad-based
//! proof of work, deduplicated per round, and credited per login. A share
//! that also meets block difficulty is handed to the daemon; an accepted
//! block closes the round and splits the reward.

pub mod api;
pub mod api_client;
pub mod block;
pub mod chain;
pub mod config;
pub mod credentials;
pub mod devnet;
pub mod error;
pub mod job;
pub mod payout;
pub mod pool;
pub mod protocol;
pub mod scratchpad;
pub mod server;
pub mod session;
pub mod shares;
pub mod template;
pub mod tracing;
pub mod types;
