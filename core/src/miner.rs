//! The miner loop and cooperative proof-of-work worker.
//!
//! Grounded in `original_source/miner_node.py`'s `Miner` and
//! `pow_mechanism.py`'s `ProofOfWork`, restructured around the idiom used in
//! `bond-core/src/mining.rs` (`AtomicBool` stop flag, `thread::spawn` per
//! node) rather than that module's multi-threaded nonce-range split: this
//! design calls for exactly one PoW search per node, interruptible at fixed
//! checkpoints, not a parallel hash-rate race with no cancellation
//! contract. Every other piece of per-node state (`waiting_txn_pool`,
//! `received_outputs`, the `Ledger`) is touched only by the node's own
//! thread; [`crate::network::PeerNetwork`] inboxes are the sole
//! cross-thread channel.

use crate::block::MinedBlock;
use crate::config::ChainParams;
use crate::ledger::Ledger;
use crate::network::{Message, PeerNetwork};
use crate::script;
use crate::transaction::{Txn, TxnInput, TxnOutput};
use crate::hashing::double_sha256;
use shared::crypto::{self, create_digital_signature, KeyPair};
use shared::Hash;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long a node sleeps before re-checking its mempool when it has
/// nothing to mine. The original simulation uses a flat 5 seconds, which
/// would make a demo run glacial — kept short enough for an interactive CLI
/// demo while staying clearly a polling interval, not a busy loop.
const EMPTY_MEMPOOL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Interruption checkpoint: the PoW search pauses to drain the message
/// queue every this-many nonces.
const POW_CHECKPOINT_INTERVAL: u64 = 1000;

/// One simulated node: its keys, mempool, ledger, and the cooperative PoW
/// worker that mines against its own inbox on [`PeerNetwork`].
pub struct MinerNode {
    node_index: usize,
    keys: KeyPair,
    pub_key_hash: String,
    waiting_txn_pool: Vec<Txn>,
    received_outputs: Vec<(Hash, i64)>,
    ledger: Ledger,
    network: Arc<PeerNetwork>,
    params: ChainParams,
    running: Arc<AtomicBool>,
    stop_mining: Arc<AtomicBool>,
}

impl MinerNode {
    /// Creates a fresh node with its own keypair, registers its address on
    /// `network`, and leaves it with an empty ledger (the caller installs
    /// genesis separately via [`Self::install_genesis`], mirroring
    /// `store_genesis_block` in the original).
    #[must_use]
    pub fn new(node_index: usize, network: Arc<PeerNetwork>, params: ChainParams) -> Self {
        let keys = KeyPair::generate();
        let pub_key_hash = crypto::compute_hash160(&keys.public_key);
        network.register_address(pub_key_hash.clone(), node_index);

        Self {
            node_index,
            keys,
            pub_key_hash,
            waiting_txn_pool: Vec::new(),
            received_outputs: Vec::new(),
            ledger: Ledger::new(params),
            network,
            params,
            running: Arc::new(AtomicBool::new(true)),
            stop_mining: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn node_index(&self) -> usize {
        self.node_index
    }

    #[must_use]
    pub fn pub_key_hash(&self) -> &str {
        &self.pub_key_hash
    }

    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// A clone of the flag an external driver can flip to stop this node's
    /// main loop at its next iteration boundary.
    #[must_use]
    pub fn running_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Builds the well-known genesis block, paying its coinbase to this
    /// node's own key. Mirrors `Miner.generate_genesis_block` in the
    /// original: called once, on whichever node is the designated genesis
    /// miner, before [`Self::install_genesis`] is called on every node
    /// (including this one) with the identical result.
    #[must_use]
    pub fn generate_genesis_block(&self, params: &ChainParams) -> MinedBlock {
        let coinbase = Txn::create_coinbase_txn(&self.keys, params.mining_reward);
        MinedBlock::bootstrap_genesis(coinbase, params.bits, params.merkle_tree_arity)
    }

    /// Installs `genesis` directly, bypassing the mempool/mining path, and
    /// (if this node mined it) records its own coinbase output so it can
    /// spend it later — mirroring the bootstrap-time direct call the
    /// original makes before any thread starts, when there is no
    /// cross-thread race to guard against.
    pub fn install_genesis(&mut self, genesis: MinedBlock) {
        let coinbase_txid = genesis.transactions[0].transaction_id.clone();
        self.ledger
            .append_block(genesis, true)
            .expect("genesis installation never fails validation");
        if self.ledger.utxo_set().has_output(&coinbase_txid, 0) {
            self.received_outputs.push((coinbase_txid, 0));
        }
    }

    /// The cooperative mining loop: snapshot the mempool into a template,
    /// mine it, and repeat until [`Self::running_handle`] is cleared.
    pub fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            if self.mine_one_block().is_none() {
                thread::sleep(EMPTY_MEMPOOL_POLL_INTERVAL);
                self.drain_and_handle_messages();
            }
        }
    }

    /// Drains and dispatches this node's inbox without mining. Exposed for
    /// synchronous drivers and tests that want deterministic control over
    /// when a node observes new messages, rather than racing its own
    /// mining-loop thread.
    pub fn process_inbox(&mut self) {
        self.drain_and_handle_messages();
    }

    /// Synchronously mines exactly one block from the current mempool
    /// snapshot and integrates it, mirroring one iteration of
    /// [`Self::run`]'s body. Returns `None` without mining anything if the
    /// mempool is currently empty, or if the search was preempted by an
    /// incoming block before it found a nonce.
    ///
    /// Before templating, each pooled transaction is re-checked against the
    /// live UTXO set and against the outpoints already claimed earlier in
    /// this same batch, dropping it silently if either check fails. Neither
    /// `validate_block` nor the original simulation's template assembly
    /// tracks intra-block conflicts — each ordinary transaction is validated
    /// independently against the snapshot UTXO — so two pooled transactions
    /// racing to spend the same output would otherwise both land in one
    /// block and both pass validation. This filter is what actually makes
    /// double-spend prevention hold across a mined block: the loser of the
    /// race is dropped here rather than surfacing as a malformed block
    /// later.
    pub fn mine_one_block(&mut self) -> Option<MinedBlock> {
        if self.waiting_txn_pool.is_empty() {
            return None;
        }

        let snapshot = std::mem::take(&mut self.waiting_txn_pool);
        let mut claimed_outpoints: HashSet<(Hash, i64)> = HashSet::new();
        let mut selected = Vec::with_capacity(snapshot.len());
        for txn in snapshot {
            if self.ledger.validate_transaction(&txn).is_err() {
                continue;
            }
            let conflicts = txn.inputs.iter().any(|input| {
                claimed_outpoints.contains(&(input.transaction_id.clone(), input.output_index))
            });
            if conflicts {
                continue;
            }
            for input in &txn.inputs {
                claimed_outpoints.insert((input.transaction_id.clone(), input.output_index));
            }
            selected.push(txn);
        }

        let coinbase = Txn::create_coinbase_txn(&self.keys, self.params.mining_reward);
        let mut transactions = Vec::with_capacity(selected.len() + 1);
        transactions.push(coinbase);
        transactions.extend(selected);

        let template = MinedBlock::new(
            transactions,
            self.ledger.last_block_hash().clone(),
            self.params.bits,
            self.params.merkle_tree_arity,
        );
        self.run_pow(template)
    }

    #[must_use]
    pub fn mempool_len(&self) -> usize {
        self.waiting_txn_pool.len()
    }

    #[must_use]
    pub fn mempool_transaction_ids(&self) -> Vec<Hash> {
        self.waiting_txn_pool.iter().map(|txn| txn.transaction_id.clone()).collect()
    }

    /// Searches for a nonce satisfying the difficulty target, checkpointing
    /// every [`POW_CHECKPOINT_INTERVAL`] iterations to drain the inbox and
    /// check for preemption. Consumes `template`: on success it is mined,
    /// appended, broadcast, and returned; on preemption it is dropped and
    /// `None` is returned.
    fn run_pow(&mut self, mut template: MinedBlock) -> Option<MinedBlock> {
        self.stop_mining.store(false, Ordering::SeqCst);
        let target = pow_target(self.params.bits);
        let mut nonce: u64 = 0;

        loop {
            if self.stop_mining.load(Ordering::SeqCst) {
                debug!(node = self.node_index, "pow search abandoned, better block arrived");
                return None;
            }

            let hash = double_sha256(&template.serialize_header(nonce));
            if hash.as_str() < target.as_str() {
                template.nonce = nonce;
                template.block_hash = hash;
                return if self.accept_own_block(template.clone()) {
                    Some(template)
                } else {
                    None
                };
            }

            if nonce % POW_CHECKPOINT_INTERVAL == 0 {
                self.drain_and_handle_messages();
                if self.stop_mining.load(Ordering::SeqCst) {
                    return None;
                }
            }

            nonce += 1;
        }
    }

    fn accept_own_block(&mut self, block: MinedBlock) -> bool {
        match self.ledger.append_block(block.clone(), false) {
            Ok(result) => {
                info!(node = self.node_index, height = self.ledger.chain_height(), "mined block");
                self.prune_mempool(&result.confirmed_transaction_ids);
                self.requeue_undone_transactions(result.undone_transactions);
                self.network.broadcast_block(&block, self.node_index);
                self.redistribute_orphan_transactions();
                true
            }
            Err(err) => {
                // A self-mined block failing validation is a local
                // invariant violation, not a recoverable rejection.
                warn!(node = self.node_index, %err, "self-mined block rejected by own ledger, halting");
                self.running.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    /// Drains this node's inbox and dispatches each message by kind.
    fn drain_and_handle_messages(&mut self) {
        for message in self.network.drain(self.node_index) {
            match message {
                Message::Txn(txn) => self.handle_incoming_transaction(txn),
                Message::Block(block) => {
                    self.handle_incoming_block(block);
                }
                Message::NewTxn { receiver_pub_key_hash, amount } => {
                    self.create_transaction(&receiver_pub_key_hash, amount);
                }
                Message::OutputCredit { transaction_id, output_index } => {
                    self.received_outputs.push((transaction_id, output_index));
                }
            }
        }
    }

    /// Validates an incoming transaction and, if it passes, pools it.
    /// Invalid transactions are dropped silently.
    fn handle_incoming_transaction(&mut self, txn: Txn) {
        if self.ledger.validate_transaction(&txn).is_ok() {
            self.waiting_txn_pool.push(txn);
        } else {
            debug!(node = self.node_index, txid = %txn.transaction_id, "dropped invalid transaction");
        }
    }

    /// Validates and integrates an incoming block; on success, raises
    /// `stop_mining` so the current PoW search abandons its now-stale
    /// template. Returns whether the block was accepted.
    fn handle_incoming_block(&mut self, block: MinedBlock) -> bool {
        match self.ledger.append_block(block, false) {
            Ok(result) => {
                self.prune_mempool(&result.confirmed_transaction_ids);
                self.requeue_undone_transactions(result.undone_transactions);
                self.stop_mining.store(true, Ordering::SeqCst);
                self.redistribute_orphan_transactions();
                true
            }
            Err(err) => {
                debug!(node = self.node_index, %err, "rejected incoming block");
                false
            }
        }
    }

    /// Asks the ledger which blocks have just become orphans (fallen
    /// `orphan_threshold` blocks behind the best chain) and rebroadcasts
    /// whichever of their transactions still have unspent inputs, so the
    /// network gets a chance to re-confirm them. Called opportunistically
    /// after every block this node accepts, its own or a peer's.
    fn redistribute_orphan_transactions(&mut self) {
        for txn in self.ledger.redistribute_orphan_transactions() {
            self.network.broadcast_transaction(&txn, self.node_index);
        }
    }

    fn prune_mempool(&mut self, confirmed_transaction_ids: &[Hash]) {
        if confirmed_transaction_ids.is_empty() {
            return;
        }
        self.waiting_txn_pool
            .retain(|txn| !confirmed_transaction_ids.contains(&txn.transaction_id));
    }

    /// Re-admits transactions a reorg knocked off the best chain, as long as
    /// their inputs are still unspent under the new UTXO state.
    fn requeue_undone_transactions(&mut self, undone_transactions: Vec<Txn>) {
        for txn in undone_transactions {
            if self.ledger.validate_transaction(&txn).is_ok() {
                self.waiting_txn_pool.push(txn);
            }
        }
    }

    /// Funds and broadcasts a payment of `amount` to `receiver_pub_key_hash`.
    /// Returns `false` without broadcasting anything if the node's known
    /// spendable outputs don't cover `amount`.
    pub fn create_transaction(&mut self, receiver_pub_key_hash: &str, amount: u64) -> bool {
        let (selected, total_available) = self
            .ledger
            .get_available_inputs(&self.received_outputs, amount);

        if selected.is_empty() || total_available < amount {
            return false;
        }

        let mut outputs = vec![TxnOutput::new(amount, receiver_pub_key_hash.to_string())];
        let has_change_output = total_available > amount;
        if has_change_output {
            outputs.push(TxnOutput::new(total_available - amount, self.pub_key_hash.clone()));
        }

        let mut inputs = Vec::with_capacity(selected.len());
        for (prev_txid, prev_vout) in &selected {
            let signature = create_digital_signature(prev_txid.as_str(), &self.keys.private_key)
                .expect("node's own signing key is always well-formed");
            let unlocking_script = script::build_unlocking_script(&signature, &self.keys.public_key);
            inputs.push(TxnInput::new(prev_txid.clone(), *prev_vout, unlocking_script));
        }

        let new_txn = Txn::new(inputs, outputs);

        // The original's wallet never retires a spent outpoint from its
        // candidate list until a confirming block prunes it elsewhere: a
        // node can hand out the same unconfirmed output twice, and the
        // ledger's double-spend check is what actually arbitrates it.
        // Preserved here rather than "fixed", since double-spend prevention
        // between two competing spends of the same outpoint depends on
        // exactly this being possible.
        if has_change_output {
            self.received_outputs.push((new_txn.transaction_id.clone(), 1));
        }

        // Route through this node's own inbox first, exactly like every
        // other transaction, so it's admitted to the mempool by the same
        // validate-then-pool path as a peer's transaction would be.
        self.network.send(self.node_index, Message::Txn(new_txn.clone()));
        self.network.broadcast_transaction(&new_txn, self.node_index);

        // Unconditionally notify the receiver of output index 0, even
        // though a change output (if any) occupies index 0 and the payment
        // sits at index 1 in that case. This is a simulation shortcut worth
        // removing in a realistic implementation (a real wallet would scan
        // the chain for its own outputs instead of being told); preserved
        // here to keep behaviour identical to the original.
        self.network.send_to_address(
            receiver_pub_key_hash,
            Message::OutputCredit {
                transaction_id: new_txn.transaction_id,
                output_index: 0,
            },
        );

        true
    }
}

/// The textual hex target a block hash must fall below: `bits` zeros, a `1`
/// marker, then zero-padding out to 64 hex characters.
fn pow_target(bits: u32) -> String {
    let bits = bits as usize;
    format!("{}1{}", "0".repeat(bits), "0".repeat(63usize.saturating_sub(bits)))
}
