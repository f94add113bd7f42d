//! Transactions: inputs, outputs, their exact wire serialization, and
//! coinbase construction.
//!
//! The serialization format is grounded byte-for-byte in
//! `original_source/txn_input.py`, `txn_output.py`, and
//! `transaction_data.py` — including its asymmetries (script-size fields
//! are unpadded hex, but counts and amounts are padded). Downstream code
//! (block headers, transaction ids) depends on this format being stable, so
//! nothing here should be "tidied up" relative to the original shape.

use crate::hashing::{double_sha256, invert_bytes};
use crate::script;
use shared::crypto::{self, create_digital_signature, KeyPair};
use shared::Hash;

/// Sentinel previous-output index marking a coinbase input.
pub const COINBASE_OUTPUT_INDEX: i64 = -1;

/// One spent outpoint plus the script proving the right to spend it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TxnInput {
    pub transaction_id: Hash,
    pub output_index: i64,
    pub unlocking_script: String,
}

impl TxnInput {
    #[must_use]
    pub fn new(transaction_id: Hash, output_index: i64, unlocking_script: String) -> Self {
        Self {
            transaction_id,
            output_index,
            unlocking_script,
        }
    }

    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.transaction_id.is_null() && self.output_index == COINBASE_OUTPUT_INDEX
    }

    /// Serializes this input the way the original wire format does:
    /// reversed txid, reversed vout (`ffffffff` for coinbase), an unpadded
    /// hex script-size, the script itself, then a trailing `ffffffff`
    /// sequence field.
    #[must_use]
    pub fn serialize(&self) -> String {
        let reversed_txid = invert_bytes(self.transaction_id.as_str());

        let vout_hex = if self.output_index == COINBASE_OUTPUT_INDEX {
            "f".repeat(8)
        } else {
            format!("{:08x}", self.output_index)
        };
        let reversed_vout = invert_bytes(&vout_hex);

        let script_size = format!("{:x}", self.unlocking_script.len() / 2);

        format!("{reversed_txid}{reversed_vout}{script_size}{}ffffffff", self.unlocking_script)
    }
}

/// A payment of `amount` locked to `locking_script` (a hash160 address).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TxnOutput {
    pub amount: u64,
    pub locking_script: String,
}

impl TxnOutput {
    #[must_use]
    pub fn new(amount: u64, locking_script: String) -> Self {
        Self {
            amount,
            locking_script,
        }
    }

    /// Serializes this output as a reversed, zero-padded 8-byte amount
    /// followed by an unpadded hex script-size and the locking script.
    #[must_use]
    pub fn serialize(&self) -> String {
        let hex_amount = format!("{:016x}", self.amount);
        let reversed_amount = invert_bytes(&hex_amount);
        let script_size = format!("{:x}", self.locking_script.len() / 2);

        format!("{reversed_amount}{script_size}{}", self.locking_script)
    }
}

/// A transaction: a list of spent inputs and newly created outputs. Its id
/// is the double-SHA256 of its own serialization, computed once at
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Txn {
    pub inputs: Vec<TxnInput>,
    pub outputs: Vec<TxnOutput>,
    pub transaction_id: Hash,
}

impl Txn {
    #[must_use]
    pub fn new(inputs: Vec<TxnInput>, outputs: Vec<TxnOutput>) -> Self {
        let mut txn = Self {
            inputs,
            outputs,
            transaction_id: Hash::null(),
        };
        txn.transaction_id = double_sha256(&txn.serialize());
        txn
    }

    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    #[must_use]
    pub fn total_output_amount(&self) -> u64 {
        self.outputs.iter().map(|o| o.amount).sum()
    }

    /// Serializes the transaction as a count-prefixed, single-digit-padded
    /// sequence of input and output serializations. Mirrors
    /// `transaction_data.Txn.serialize`.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut parts = String::new();
        parts.push_str(&count_hex(self.inputs.len()));
        for input in &self.inputs {
            parts.push_str(&input.serialize());
        }

        parts.push_str(&count_hex(self.outputs.len()));
        for output in &self.outputs {
            parts.push_str(&output.serialize());
        }

        parts
    }

    /// Builds the single coinbase transaction for a newly mined block,
    /// paying the fixed mining reward to the miner's own key. The coinbase
    /// signature script carries the miner's signature over a fixed message
    /// and their public key, exactly as a spendable P2PKH output would, even
    /// though a coinbase input never actually gets verified against a prior
    /// output.
    #[must_use]
    pub fn create_coinbase_txn(keys: &KeyPair, mining_reward: u64) -> Self {
        const COINBASE_MESSAGE: &str = "I am inevitable";

        let signature = create_digital_signature(COINBASE_MESSAGE, &keys.private_key)
            .expect("coinbase signing key is always well-formed");
        let unlocking_script = script::build_unlocking_script(&signature, &keys.public_key);

        let input = TxnInput::new(Hash::null(), COINBASE_OUTPUT_INDEX, unlocking_script);

        let locking_script = crypto::compute_hash160(&keys.public_key);
        let output = TxnOutput::new(mining_reward, locking_script);

        Self::new(vec![input], vec![output])
    }
}

/// `hex(count)`, zero-padded to two digits only when it would otherwise be
/// a single hex digit — matching the original's ad hoc padding rule.
fn count_hex(count: usize) -> String {
    let raw = format!("{count:x}");
    if raw.len() == 1 {
        format!("0{raw}")
    } else {
        raw
    }
}
