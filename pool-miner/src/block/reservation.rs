//! Per-session reservation stamp for the miner transaction extra field.
//!
//! Templates are requested from the daemon with a blank reserved region.
//! Before a job goes out, the region is filled with the project tag followed
//! by the session id in fixed-width hex, so a block found later can be traced
//! to the exact session that mined it:
//!
//! ```text
//! "@#@" | 16 hex digits of the session id | space padding
//! ```

use thiserror::Error;

use super::MinerExtra;
use crate::session::SessionId;

/// Tag that marks a pool-stamped miner transaction.
pub const PROJECT_TAG: &[u8] = b"@#@";

const ID_DIGITS: usize = 16;

/// Minimum size of the reserved region.
pub const RESERVED_LEN: usize = PROJECT_TAG.len() + ID_DIGITS;

const PADDING: u8 = b' ';

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReservationError {
    #[error("reserved region too small: {actual} bytes, need {required}")]
    RegionTooSmall { actual: usize, required: usize },
}

/// Builder for the reserved region of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStamp {
    session: SessionId,
}

impl SessionStamp {
    pub fn new(session: SessionId) -> Self {
        Self { session }
    }

    /// Placeholder handed to the daemon when requesting a template.
    pub fn reserve() -> Vec<u8> {
        let mut region = PROJECT_TAG.to_vec();
        region.resize(RESERVED_LEN, PADDING);
        region
    }

    /// Encoded stamp without padding.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = PROJECT_TAG.to_vec();
        out.extend_from_slice(format!("{:016x}", self.session.get()).as_bytes());
        out
    }

    /// Write the stamp into `extra`, padding the remainder of the region.
    ///
    /// The region is never grown: a template whose reservation is shorter
    /// than [`RESERVED_LEN`] is rejected.
    pub fn apply(&self, extra: &mut MinerExtra) -> Result<(), ReservationError> {
        let region = &mut extra.reserved;
        if region.len() < RESERVED_LEN {
            return Err(ReservationError::RegionTooSmall {
                actual: region.len(),
                required: RESERVED_LEN,
            });
        }

        let stamp = self.encode();
        region[..stamp.len()].copy_from_slice(&stamp);
        region[stamp.len()..].fill(PADDING);
        Ok(())
    }

    /// Recover the session id from a stamped region.
    pub fn parse(region: &[u8]) -> Option<SessionId> {
        let rest = region.strip_prefix(PROJECT_TAG)?;
        let digits = std::str::from_utf8(rest.get(..ID_DIGITS)?).ok()?;
        u64::from_str_radix(digits, 16).ok().map(SessionId::new)
    }
}
