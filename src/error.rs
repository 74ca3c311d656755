use thiserror::Error;

use crate::key::Key;
use crate::KEY_BITS;

/// Errors surfaced by ring operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChordError {
    /// The remote node did not answer within the request timeout. Recoverable:
    /// the periodic protocols skip the round and retry on the next tick, while
    /// one-shot operations surface it to the caller.
    #[error("node at {addr} is unreachable")]
    Unreachable { addr: String },

    /// The responder no longer owns the identifier the request was addressed
    /// to; the routing entry that produced it was stale. Recoverable: the
    /// caller re-resolves the owner and retries.
    #[error("identity mismatch: expected {expected:?}, reached {actual:?}")]
    IdentityMismatch { expected: Key, actual: Key },

    /// The configured identifier-space size is unsupported. Fatal at startup.
    #[error("identifier space of {bits} bits is not supported; must be non-zero, at most 128, and divisible by 8")]
    InvalidConfiguration { bits: usize },

    /// A lookup took more hops than a healthy ring can require, which means
    /// the routing state is corrupted.
    #[error("lookup exceeded {0} hops")]
    HopLimitExceeded(usize),

    /// The remote node refused the operation, typically because it is leaving
    /// the ring.
    #[error("node at {addr} is not serving: {reason}")]
    Rejected { addr: String, reason: String },
}

impl ChordError {
    /// Validates the compile-time identifier-space size. Checked once per node
    /// at startup.
    pub(crate) fn check_key_bits() -> Result<(), ChordError> {
        if KEY_BITS == 0 || KEY_BITS > 128 || KEY_BITS % 8 != 0 {
            Err(ChordError::InvalidConfiguration { bits: KEY_BITS })
        } else {
            Ok(())
        }
    }
}
