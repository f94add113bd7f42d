//! Mined blocks: header layout, exact header serialization for hashing, and
//! genesis construction.
//!
//! Grounded in `original_source/block_data.py`. The header is flattened
//! rather than split into a separate header/body pair, matching the
//! original's single `MinedBlock` object — there is no independent
//! `BlockHeader` type here, just the fields `serialize_header` reads.

use crate::hashing::{invert_bytes, merkle_root};
use crate::transaction::Txn;
use shared::Hash;

/// The fixed genesis hash baked into the original simulation
/// (`original_source/miner_node.py::generate_genesis_block`), installed
/// identically on every node rather than actually mined. It does not satisfy
/// `double_sha256(serialize_header(nonce))` for any nonce, which is why
/// genesis bypasses `validate_block` entirely.
pub const GENESIS_BLOCK_HASH: &str = "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";

/// A mined (or in-progress) block: its transactions plus the header fields
/// needed to hash and link it into the chain.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MinedBlock {
    pub transactions: Vec<Txn>,
    pub nonce: u64,
    pub block_hash: Hash,
    pub previous_hash: Hash,
    pub difficulty_bits: u32,
    pub merkle_tree_root: Hash,
}

impl MinedBlock {
    /// Builds a block over `transactions` extending `previous_hash`, with
    /// its Merkle root precomputed and `block_hash` left unset until
    /// mining succeeds.
    #[must_use]
    pub fn new(transactions: Vec<Txn>, previous_hash: Hash, difficulty_bits: u32, merkle_arity: usize) -> Self {
        let merkle_tree_root = compute_merkle_root(&transactions, merkle_arity);
        Self {
            transactions,
            nonce: 0,
            block_hash: Hash::null(),
            previous_hash,
            difficulty_bits,
            merkle_tree_root,
        }
    }

    /// Serializes the header for hashing with a candidate `nonce`: the
    /// previous hash, Merkle root, difficulty bits, and nonce, each
    /// byte-reversed and concatenated. Mirrors
    /// `block_data.MinedBlock.serialize_header`.
    #[must_use]
    pub fn serialize_header(&self, nonce: u64) -> String {
        let mut serialized = invert_bytes(self.previous_hash.as_str());
        serialized.push_str(&invert_bytes(self.merkle_tree_root.as_str()));

        let bits_hex = even_hex(self.difficulty_bits);
        serialized.push_str(&invert_bytes(&bits_hex));

        let nonce_hex = even_hex(nonce);
        serialized.push_str(&invert_bytes(&nonce_hex));

        serialized
    }

    /// Recomputes the Merkle root over this block's current transactions.
    #[must_use]
    pub fn calculate_merkle_root(&self, merkle_arity: usize) -> Hash {
        compute_merkle_root(&self.transactions, merkle_arity)
    }

    /// Builds the genesis block around a single coinbase transaction. The
    /// block is left with `nonce = 0` and an unset hash; callers are
    /// expected to mine it like any other block so that
    /// `block_hash == double_sha256(serialize_header(nonce))` holds even
    /// for genesis.
    #[must_use]
    pub fn genesis(coinbase_txn: Txn, difficulty_bits: u32, merkle_arity: usize) -> Self {
        Self::new(vec![coinbase_txn], Hash::null(), difficulty_bits, merkle_arity)
    }

    /// Builds the well-known bootstrap genesis block every node installs
    /// before mining starts: same shape as [`Self::genesis`], but with its
    /// `block_hash` fixed to [`GENESIS_BLOCK_HASH`] rather than mined, so
    /// that every node agrees on the starting tip bit-for-bit.
    #[must_use]
    pub fn bootstrap_genesis(coinbase_txn: Txn, difficulty_bits: u32, merkle_arity: usize) -> Self {
        let mut block = Self::genesis(coinbase_txn, difficulty_bits, merkle_arity);
        block.block_hash = Hash::from_hex(GENESIS_BLOCK_HASH)
            .expect("GENESIS_BLOCK_HASH is a valid 64-char hex constant");
        block
    }
}

fn even_hex(value: impl Into<u64>) -> String {
    let raw = format!("{:x}", value.into());
    if raw.len() % 2 != 0 {
        format!("0{raw}")
    } else {
        raw
    }
}

fn compute_merkle_root(transactions: &[Txn], arity: usize) -> Hash {
    let hashes: Vec<Hash> = transactions.iter().map(|t| t.transaction_id.clone()).collect();
    merkle_root(&hashes, arity).unwrap_or_else(Hash::null)
}
