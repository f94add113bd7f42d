//! Primitives shared between `chain-core` and the `utxo-node` binary:
//! the hex hash type, the error enum, and the ECDSA/hash160 crypto layer.

pub mod crypto;
pub mod error;
pub mod hash;

pub use crypto::{
    compute_hash160, create_digital_signature, verify_signature, KeyPair, PrivateKeyHex,
    PublicKeyHex, SignatureHex,
};
pub use error::BlockchainError;
pub use hash::{Hash, HASH_HEX_LEN};

pub type Result<T> = std::result::Result<T, BlockchainError>;
