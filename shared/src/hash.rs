//! The 256-bit hash type used throughout the chain: transaction ids, block
//! hashes, and Merkle roots are all instances of this one textual hex type.

use crate::error::BlockchainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length in hex characters of a `Hash` (32 bytes -> 64 hex chars).
pub const HASH_HEX_LEN: usize = 64;

/// A 64-character lowercase hex digest.
///
/// The simulation's hashing is defined over hex *text*, not raw bytes (see
/// [`crate::double_sha256`] semantics in `chain-core`), so `Hash` stores its
/// digest as a validated lowercase hex string rather than `[u8; 32]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash(String);

impl Hash {
    /// The all-zero sentinel hash: coinbase `prev_txid` and the genesis
    /// block's `previous_hash`.
    #[must_use]
    pub fn null() -> Self {
        Self("0".repeat(HASH_HEX_LEN))
    }

    /// Validates and wraps a hex string as a `Hash`.
    ///
    /// # Errors
    ///
    /// Returns [`BlockchainError::InvalidHash`] if `hex` is not exactly
    /// [`HASH_HEX_LEN`] hex characters.
    pub fn from_hex(hex: impl Into<String>) -> Result<Self, BlockchainError> {
        let hex = hex.into();
        if hex.len() != HASH_HEX_LEN || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(BlockchainError::InvalidHash);
        }
        Ok(Self(hex.to_ascii_lowercase()))
    }

    /// Wraps an already-validated hex digest without re-checking its shape.
    /// Used internally by the hashing routines, which only ever produce
    /// well-formed digests.
    #[must_use]
    pub fn from_digest_unchecked(hex: String) -> Self {
        debug_assert_eq!(hex.len(), HASH_HEX_LEN);
        Self(hex)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.bytes().all(|b| b == b'0')
    }

    /// The byte at `index` within the hex string (useful for prefix-bucketing
    /// a collection of hashes).
    #[must_use]
    pub fn hex_char_at(&self, index: usize) -> u8 {
        self.0.as_bytes()[index]
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Default for Hash {
    fn default() -> Self {
        Self::null()
    }
}
