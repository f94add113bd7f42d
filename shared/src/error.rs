use thiserror::Error;

/// Errors shared across the chain-core and binary crates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockchainError {
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("invalid block: {0}")]
    InvalidBlock(String),

    #[error("malformed hash")]
    InvalidHash,

    #[error("insufficient proof of work")]
    InsufficientDifficulty,

    #[error("no unspent output at that outpoint")]
    UtxoNotFound,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("cryptographic error: {0}")]
    CryptographicError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("unknown parent block, cannot attach")]
    UnknownParent,

    #[error("a node mutex was poisoned by a panicking thread")]
    Poisoned,
}

/// Convenience alias used throughout `shared` and `chain-core`.
pub type Result<T> = std::result::Result<T, BlockchainError>;
