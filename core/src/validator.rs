//! Stateless transaction and block validation against a UTXO snapshot.
//!
//! Grounded in `original_source/chain_manager.py`'s `validate_transaction`
//! and `validate_block`. Deliberately does *not* re-check proof of work
//! against the configured difficulty target during block validation — the
//! original only re-derives the header hash and compares it to the block's
//! stored `block_hash`, trusting that a stored hash which already cleared
//! the target at mining time stays valid. A future difficulty-retarget
//! feature would need to revisit this.

use crate::config::ChainParams;
use crate::hashing::double_sha256;
use crate::script::execute_p2pkh;
use crate::transaction::Txn;
use crate::block::MinedBlock;
use crate::utxo::UtxoSet;
use shared::BlockchainError;

/// Checks that every input of `txn` spends a currently-unspent output it's
/// entitled to (by P2PKH script), and that outputs don't exceed inputs.
///
/// # Errors
///
/// Returns [`BlockchainError::UtxoNotFound`], [`BlockchainError::InvalidSignature`],
/// or [`BlockchainError::InsufficientFunds`] for the corresponding failure.
pub fn validate_transaction(txn: &Txn, utxo_set: &UtxoSet) -> Result<(), BlockchainError> {
    let mut total_input_amount: u64 = 0;

    for input in &txn.inputs {
        if !utxo_set.has_output(&input.transaction_id, input.output_index) {
            return Err(BlockchainError::UtxoNotFound);
        }

        let referenced = utxo_set
            .get_transaction(&input.transaction_id)
            .ok_or(BlockchainError::UtxoNotFound)?;
        let output = referenced
            .outputs
            .get(usize::try_from(input.output_index).map_err(|_| BlockchainError::UtxoNotFound)?)
            .ok_or(BlockchainError::UtxoNotFound)?;

        if !execute_p2pkh(&input.unlocking_script, &output.locking_script, input.transaction_id.as_str()) {
            return Err(BlockchainError::InvalidSignature);
        }

        total_input_amount += output.amount;
    }

    if txn.total_output_amount() > total_input_amount {
        return Err(BlockchainError::InsufficientFunds);
    }

    Ok(())
}

/// Checks a candidate block's hash, Merkle root, and every non-coinbase
/// transaction, then verifies the coinbase's shape and reward bound.
///
/// # Errors
///
/// Returns [`BlockchainError::InvalidBlock`] for a header/Merkle mismatch or
/// malformed coinbase, or the underlying transaction error for a bad spend.
pub fn validate_block(
    block: &MinedBlock,
    utxo_set: &UtxoSet,
    params: &ChainParams,
) -> Result<(), BlockchainError> {
    let serialized_header = block.serialize_header(block.nonce);
    let calculated_hash = double_sha256(&serialized_header);

    if calculated_hash != block.block_hash {
        return Err(BlockchainError::InvalidBlock("header hash mismatch".to_string()));
    }
    if block.merkle_tree_root != block.calculate_merkle_root(params.merkle_tree_arity) {
        return Err(BlockchainError::InvalidBlock("merkle root mismatch".to_string()));
    }

    if block.transactions.is_empty() {
        return Err(BlockchainError::InvalidBlock("block has no coinbase".to_string()));
    }

    let mut coinbase_fees: u64 = 0;
    for txn in &block.transactions[1..] {
        let mut input_amount: u64 = 0;
        for input in &txn.inputs {
            if !utxo_set.has_output(&input.transaction_id, input.output_index) {
                return Err(BlockchainError::UtxoNotFound);
            }
            let referenced = utxo_set
                .get_transaction(&input.transaction_id)
                .ok_or(BlockchainError::UtxoNotFound)?;
            let output = referenced
                .outputs
                .get(usize::try_from(input.output_index).map_err(|_| BlockchainError::UtxoNotFound)?)
                .ok_or(BlockchainError::UtxoNotFound)?;

            if !execute_p2pkh(&input.unlocking_script, &output.locking_script, input.transaction_id.as_str()) {
                return Err(BlockchainError::InvalidSignature);
            }
            input_amount += output.amount;
        }

        let output_amount = txn.total_output_amount();
        if output_amount > input_amount {
            return Err(BlockchainError::InsufficientFunds);
        }
        coinbase_fees += input_amount - output_amount;
    }

    let coinbase = &block.transactions[0];
    let coinbase_shape_ok = coinbase.inputs.len() == 1
        && coinbase.inputs[0].transaction_id.is_null()
        && coinbase.inputs[0].output_index == crate::transaction::COINBASE_OUTPUT_INDEX
        && coinbase.outputs.len() == 1;
    if !coinbase_shape_ok {
        return Err(BlockchainError::InvalidBlock("malformed coinbase".to_string()));
    }

    if coinbase.outputs[0].amount > coinbase_fees + params.mining_reward {
        return Err(BlockchainError::InvalidBlock(
            "coinbase pays more than fees plus reward".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{TxnInput, TxnOutput};
    use shared::crypto::{create_digital_signature, KeyPair};

    #[test]
    fn validate_transaction_accepts_well_formed_spend() {
        let keys = KeyPair::generate();
        let mut utxo_set = UtxoSet::new();
        let funding = Txn::create_coinbase_txn(&keys, 50);
        let funding_id = funding.transaction_id.clone();
        utxo_set.add_transaction(funding);

        let signature = create_digital_signature(funding_id.as_str(), &keys.private_key).unwrap();
        let unlocking_script = crate::script::build_unlocking_script(&signature, &keys.public_key);
        let input = TxnInput::new(funding_id, 0, unlocking_script);
        let output = TxnOutput::new(50, "b".repeat(40));
        let spend = Txn::new(vec![input], vec![output]);

        assert!(validate_transaction(&spend, &utxo_set).is_ok());
    }

    #[test]
    fn validate_transaction_rejects_overspend() {
        let keys = KeyPair::generate();
        let mut utxo_set = UtxoSet::new();
        let funding = Txn::create_coinbase_txn(&keys, 50);
        let funding_id = funding.transaction_id.clone();
        utxo_set.add_transaction(funding);

        let signature = create_digital_signature(funding_id.as_str(), &keys.private_key).unwrap();
        let unlocking_script = crate::script::build_unlocking_script(&signature, &keys.public_key);
        let input = TxnInput::new(funding_id, 0, unlocking_script);
        let output = TxnOutput::new(51, "b".repeat(40));
        let spend = Txn::new(vec![input], vec![output]);

        assert_eq!(validate_transaction(&spend, &utxo_set), Err(BlockchainError::InsufficientFunds));
    }

    #[test]
    fn validate_transaction_rejects_unknown_input() {
        let utxo_set = UtxoSet::new();
        let input = TxnInput::new(sample_hash(), 0, String::new());
        let output = TxnOutput::new(1, "b".repeat(40));
        let spend = Txn::new(vec![input], vec![output]);

        assert_eq!(validate_transaction(&spend, &utxo_set), Err(BlockchainError::UtxoNotFound));
    }

    fn sample_hash() -> shared::Hash {
        shared::Hash::from_hex("a".repeat(64)).unwrap()
    }

    #[test]
    fn validate_block_accepts_properly_mined_genesis() {
        let keys = KeyPair::generate();
        let params = ChainParams::default();
        let coinbase = Txn::create_coinbase_txn(&keys, params.mining_reward);
        let mut block = MinedBlock::genesis(coinbase, params.bits, params.merkle_tree_arity);

        mine_for_test(&mut block, params.bits);

        let utxo_set = UtxoSet::new();
        assert!(validate_block(&block, &utxo_set, &params).is_ok());
    }

    #[test]
    fn validate_block_rejects_tampered_hash() {
        let keys = KeyPair::generate();
        let params = ChainParams::default();
        let coinbase = Txn::create_coinbase_txn(&keys, params.mining_reward);
        let mut block = MinedBlock::genesis(coinbase, params.bits, params.merkle_tree_arity);
        mine_for_test(&mut block, params.bits);
        block.nonce += 1;

        let utxo_set = UtxoSet::new();
        assert!(validate_block(&block, &utxo_set, &params).is_err());
    }

    fn mine_for_test(block: &mut MinedBlock, bits: u32) {
        let target_prefix = "0".repeat(bits as usize);
        let mut nonce = 0u64;
        loop {
            let hash = double_sha256(&block.serialize_header(nonce));
            if hash.as_str().starts_with(&target_prefix) {
                block.nonce = nonce;
                block.block_hash = hash;
                break;
            }
            nonce += 1;
        }
    }
}
