//! Core value types shared across the pool.

mod difficulty;
mod hash;

pub use difficulty::Difficulty;
pub use hash::{Hash, HashParseError};
