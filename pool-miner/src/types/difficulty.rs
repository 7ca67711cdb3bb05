//! Difficulty type for CryptoNote-style proof-of-work.

use ruint::aliases::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Hash;

/// Mining difficulty.
///
/// CryptoNote chains express difficulty as a plain 64-bit integer. A hash
/// satisfies difficulty `d` when the hash, read as a little-endian 256-bit
/// number, can be multiplied by `d` without overflowing 256 bits:
/// ```text
/// hash * difficulty <= 2^256 - 1
/// ```
///
/// Used for:
/// - Block-level validation (the template's difficulty)
/// - Share-level validation (a fixed fraction of the block difficulty)
/// - Logging and display (human-readable values)
///
/// Higher difficulty means fewer hash values qualify.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Difficulty(u64);

impl Difficulty {
    /// Maximum representable difficulty.
    pub const MAX: Self = Self(u64::MAX);

    /// Get difficulty as u64.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Derive the share-level difficulty for a block difficulty.
    ///
    /// Shares are accepted at `1/ratio` of the block difficulty. The result
    /// never drops below 1 so a share always requires some work.
    pub fn share_difficulty(self, ratio: u64) -> Self {
        Self((self.0 / ratio.max(1)).max(1))
    }

    /// Check whether `hash` meets this difficulty.
    pub fn is_met_by(self, hash: &Hash) -> bool {
        let value = U256::from_le_bytes(*hash.as_bytes());
        value.checked_mul(U256::from(self.0)).is_some()
    }

    /// Calculate the highest difficulty a hash satisfies.
    ///
    /// Saturates at `u64::MAX`; the zero hash satisfies everything.
    pub fn from_hash(hash: &Hash) -> Self {
        let value = U256::from_le_bytes(*hash.as_bytes());
        if value == U256::ZERO {
            return Self::MAX;
        }
        let achieved = U256::MAX / value;
        if achieved > U256::from(u64::MAX) {
            Self::MAX
        } else {
            Self(achieved.as_limbs()[0])
        }
    }
}

impl From<u64> for Difficulty {
    fn from(diff: u64) -> Self {
        Self(diff)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.0 as f64;

        // Format with SI suffixes (K, M, G, T, P)
        let (scaled, suffix) = if value >= 1e15 {
            (value / 1e15, "P")
        } else if value >= 1e12 {
            (value / 1e12, "T")
        } else if value >= 1e9 {
            (value / 1e9, "G")
        } else if value >= 1e6 {
            (value / 1e6, "M")
        } else if value >= 1e3 {
            (value / 1e3, "K")
        } else {
            (value, "")
        };

        // Round to appropriate precision; omit decimals for whole numbers
        if scaled >= 100.0 || scaled.fract() == 0.0 {
            write!(f, "{:.0}{}", scaled, suffix) // "112T" or "1"
        } else if scaled >= 10.0 {
            write!(f, "{:.1}{}", scaled, suffix) // "11.2T"
        } else {
            write!(f, "{:.2}{}", scaled, suffix) // "1.12T"
        }
    }
}
