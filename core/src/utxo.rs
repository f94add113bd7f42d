//! The unspent-output index.
//!
//! `original_source/utxo_set.py` buckets transaction ids into a depth-2
//! hex-prefix trie before storing them. Every lookup here is by full
//! transaction id, never by prefix, so the trie buys nothing observable —
//! this is a flat `HashMap` instead,
//! keeping the same operation set (`add_transaction`, `add_output`,
//! `has_output`, `get_transaction`, `remove_output`, `remove_transaction`).

use crate::transaction::Txn;
use shared::Hash;
use std::collections::{HashMap, HashSet};

/// A transaction plus the set of its output indices still unspent.
#[derive(Debug, Clone)]
struct UtxoEntry {
    txn: Txn,
    unspent_vouts: HashSet<i64>,
}

/// The set of outputs any node can currently spend from.
#[derive(Debug, Clone, Default)]
pub struct UtxoSet {
    entries: HashMap<Hash, UtxoEntry>,
}

impl UtxoSet {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registers every output of `txn` as unspent.
    pub fn add_transaction(&mut self, txn: Txn) {
        let unspent_vouts = (0..txn.outputs.len() as i64).collect();
        self.entries.insert(
            txn.transaction_id.clone(),
            UtxoEntry {
                txn,
                unspent_vouts,
            },
        );
    }

    /// Re-marks a single output as unspent (used when undoing a block
    /// during a reorg). A no-op if the transaction itself isn't tracked.
    pub fn add_output(&mut self, transaction_id: &Hash, output_index: i64) {
        if let Some(entry) = self.entries.get_mut(transaction_id) {
            entry.unspent_vouts.insert(output_index);
        }
    }

    /// Returns whether `output_index` of `transaction_id` is currently
    /// unspent.
    #[must_use]
    pub fn has_output(&self, transaction_id: &Hash, output_index: i64) -> bool {
        self.entries
            .get(transaction_id)
            .is_some_and(|entry| entry.unspent_vouts.contains(&output_index))
    }

    /// Looks up the full transaction a previously-seen output belongs to,
    /// regardless of whether that particular output is still unspent.
    #[must_use]
    pub fn get_transaction(&self, transaction_id: &Hash) -> Option<&Txn> {
        self.entries.get(transaction_id).map(|entry| &entry.txn)
    }

    /// Marks a single output as spent.
    pub fn remove_output(&mut self, transaction_id: &Hash, output_index: i64) {
        if let Some(entry) = self.entries.get_mut(transaction_id) {
            entry.unspent_vouts.remove(&output_index);
        }
    }

    /// Drops a transaction and all of its outputs entirely (used when
    /// undoing a block that introduced it).
    pub fn remove_transaction(&mut self, txn: &Txn) {
        self.entries.remove(&txn.transaction_id);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{TxnInput, TxnOutput};

    fn sample_txn(amount: u64) -> Txn {
        let input = TxnInput::new(Hash::null(), -1, String::new());
        let output = TxnOutput::new(amount, "a".repeat(40));
        Txn::new(vec![input], vec![output])
    }

    #[test]
    fn add_then_has_output() {
        let mut set = UtxoSet::new();
        let txn = sample_txn(10);
        let txid = txn.transaction_id.clone();
        set.add_transaction(txn);

        assert!(set.has_output(&txid, 0));
        assert!(!set.has_output(&txid, 1));
    }

    #[test]
    fn remove_output_then_has_output_is_false() {
        let mut set = UtxoSet::new();
        let txn = sample_txn(10);
        let txid = txn.transaction_id.clone();
        set.add_transaction(txn);

        set.remove_output(&txid, 0);
        assert!(!set.has_output(&txid, 0));
    }

    #[test]
    fn add_output_restores_spent_output() {
        let mut set = UtxoSet::new();
        let txn = sample_txn(10);
        let txid = txn.transaction_id.clone();
        set.add_transaction(txn);

        set.remove_output(&txid, 0);
        set.add_output(&txid, 0);
        assert!(set.has_output(&txid, 0));
    }

    #[test]
    fn remove_transaction_drops_it_entirely() {
        let mut set = UtxoSet::new();
        let txn = sample_txn(10);
        let txid = txn.transaction_id.clone();
        set.add_transaction(txn.clone());

        set.remove_transaction(&txn);
        assert!(set.get_transaction(&txid).is_none());
        assert!(!set.has_output(&txid, 0));
    }

    #[test]
    fn unknown_transaction_has_no_outputs() {
        let set = UtxoSet::new();
        assert!(!set.has_output(&Hash::null(), 0));
    }
}
