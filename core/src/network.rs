//! The abstract peer transport.
//!
//! Grounded in `original_source/p2p_network.py`'s `PeerNetwork`: a
//! star-topology broadcaster that delivers a copy of each message to every
//! node except the sender, plus an address map from public-key hash to node
//! index so a sender can privately notify a receiver about a new output. The
//! Python original keeps both as hidden process-wide globals
//! (`PeerNetwork.nodes`, `PeerNetwork.address_map`); here it is instead one
//! explicit object, constructed once and shared via `Arc` by every node —
//! no hidden global state.
//!
//! Each node's inbox is an independently mutex-guarded `VecDeque`, which is
//! the sole cross-thread channel into a [`crate::miner::MinerNode`]:
//! messages enqueued from a given sender to a given receiver are delivered
//! in FIFO order, and no other shared state crosses threads.

use crate::block::MinedBlock;
use crate::transaction::Txn;
use shared::Hash;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// One entry in a node's inbox. Carries an owned, already-deep-copied
/// payload: the sender clones before enqueueing so that sender and receiver
/// never share mutable structure.
#[derive(Debug, Clone)]
pub enum Message {
    /// A transaction to validate and (if admitted) pool.
    Txn(Txn),
    /// A candidate block to validate and integrate.
    Block(MinedBlock),
    /// A locally-injected request ("the user asked to send money"): fund and
    /// broadcast a new payment to `receiver_pub_key_hash`.
    NewTxn {
        receiver_pub_key_hash: String,
        amount: u64,
    },
    /// Tells the receiving node it now owns a spendable output, so its
    /// wallet can include it as a future input. This replaces the original
    /// simulation's direct, unsynchronized call into the receiver's object
    /// graph (`receive_transaction_id`) with a queued message, keeping the
    /// inbox the one cross-thread channel.
    OutputCredit { transaction_id: Hash, output_index: i64 },
}

/// A star-topology broadcast network: every node's inbox, plus the address
/// map used to route a private notification to a specific node.
pub struct PeerNetwork {
    inboxes: Vec<Arc<Mutex<VecDeque<Message>>>>,
    address_map: Mutex<HashMap<String, usize>>,
}

impl PeerNetwork {
    /// Builds a network with `node_count` empty inboxes. Node indices are
    /// `0..node_count`; they're assigned by the bootstrap code that
    /// constructs each [`crate::miner::MinerNode`] against this network.
    #[must_use]
    pub fn new(node_count: usize) -> Self {
        Self {
            inboxes: (0..node_count).map(|_| Arc::new(Mutex::new(VecDeque::new()))).collect(),
            address_map: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inboxes.len()
    }

    /// Records that `node_index` owns `pub_key_hash`, so that
    /// [`Self::send_to_address`] can route to it later.
    pub fn register_address(&self, pub_key_hash: impl Into<String>, node_index: usize) {
        self.address_map
            .lock()
            .expect("address map mutex poisoned")
            .insert(pub_key_hash.into(), node_index);
    }

    fn index_for(&self, pub_key_hash: &str) -> Option<usize> {
        self.address_map.lock().expect("address map mutex poisoned").get(pub_key_hash).copied()
    }

    /// Enqueues `message` onto node `target`'s inbox.
    pub fn send(&self, target: usize, message: Message) {
        self.inboxes[target]
            .lock()
            .expect("message queue mutex poisoned")
            .push_back(message);
    }

    /// Routes `message` to whichever node owns `pub_key_hash`. A silent
    /// no-op if the address is unknown (e.g. it belongs to no local node).
    pub fn send_to_address(&self, pub_key_hash: &str, message: Message) {
        if let Some(target) = self.index_for(pub_key_hash) {
            self.send(target, message);
        }
    }

    /// Delivers a copy of `txn` to every node except `sender`.
    pub fn broadcast_transaction(&self, txn: &Txn, sender: usize) {
        for target in 0..self.inboxes.len() {
            if target != sender {
                self.send(target, Message::Txn(txn.clone()));
            }
        }
    }

    /// Delivers a copy of `block` to every node except `sender`.
    pub fn broadcast_block(&self, block: &MinedBlock, sender: usize) {
        for target in 0..self.inboxes.len() {
            if target != sender {
                self.send(target, Message::Block(block.clone()));
            }
        }
    }

    /// Drains every message currently queued for `node_index`, in FIFO
    /// order, leaving its inbox empty.
    #[must_use]
    pub fn drain(&self, node_index: usize) -> Vec<Message> {
        self.inboxes[node_index]
            .lock()
            .expect("message queue mutex poisoned")
            .drain(..)
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self, node_index: usize) -> bool {
        self.inboxes[node_index].lock().expect("message queue mutex poisoned").is_empty()
    }
}
