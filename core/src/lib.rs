//! `chain-core`: the block tree, UTXO index, validator, ledger, miner, and
//! abstract peer network for the simulated proof-of-work UTXO blockchain.
//!
//! Module layout mirrors the system's component breakdown one-to-one: each
//! `core::*` module below owns one piece of the design (hashing, scripts,
//! transactions, UTXO index, consensus, validation, ledger, mining, network).

pub mod block;
pub mod config;
pub mod consensus;
pub mod hashing;
pub mod ledger;
pub mod miner;
pub mod network;
pub mod script;
pub mod transaction;
pub mod utxo;
pub mod validator;

pub use block::MinedBlock;
pub use config::ChainParams;
pub use consensus::{ConsensusEngine, ReorgPlan};
pub use ledger::{BlockAppendResult, Ledger};
pub use miner::MinerNode;
pub use network::{Message, PeerNetwork};
pub use transaction::{Txn, TxnInput, TxnOutput};
pub use utxo::UtxoSet;
