//! Chain-wide tunables.
//!
//! Grounded in `original_source/settings.py`. Kept as a plain struct with a
//! `Default` impl rather than file-based configuration loading — the
//! teacher's own `NetworkParams` has no config-file layer either, and this
//! simulation has no deployment story that would need one.

/// Difficulty, reward, and Merkle-tree parameters shared by every node in a
/// simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChainParams {
    /// Number of leading hex zeros (plus one) a block hash must have to
    /// satisfy proof of work.
    pub bits: u32,
    /// Coinbase reward paid to the miner of a block, before fees.
    pub mining_reward: u64,
    /// Branching factor of the Merkle tree combining transaction hashes.
    pub merkle_tree_arity: usize,
    /// Height lead over the runner-up branch before a side chain is pruned
    /// and its transactions redistributed.
    pub orphan_threshold: u64,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            bits: 3,
            mining_reward: 50,
            merkle_tree_arity: 2,
            orphan_threshold: 3,
        }
    }
}
