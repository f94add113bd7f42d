//! ECDSA-over-secp256k1 signing/verification and RIPEMD160(SHA256(·))
//! address hashing.
//!
//! A thin, concrete implementation over `k256`/`ecdsa`, grounded in the
//! original simulation's use of Python's `ecdsa` library with the
//! `SECP256k1` curve (`original_source/script_engine.py`).

use crate::error::BlockchainError;
use ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// Raw-scalar private key, hex-encoded the way the original simulation's
/// `generate_key_pair` does (`private_key.to_string().hex()`).
pub type PrivateKeyHex = String;
/// Uncompressed x||y public point, hex-encoded with no leading `04` byte,
/// matching the original simulation's encoding.
pub type PublicKeyHex = String;
/// Raw `r || s` signature, hex-encoded (64 bytes -> 128 hex chars).
pub type SignatureHex = String;

/// An ECDSA secp256k1 keypair.
#[derive(Clone)]
pub struct KeyPair {
    pub private_key: PrivateKeyHex,
    pub public_key: PublicKeyHex,
}

impl KeyPair {
    /// Generates a fresh keypair over secp256k1.
    #[must_use]
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::rngs::OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);

        let private_key = hex::encode(signing_key.to_bytes());
        let public_key = encode_public_key(&verifying_key);

        Self {
            private_key,
            public_key,
        }
    }
}

fn encode_public_key(key: &VerifyingKey) -> PublicKeyHex {
    // Uncompressed SEC1 point is 0x04 || x || y (65 bytes); the original
    // simulation's key encoding drops the leading tag byte.
    let point = key.to_encoded_point(false);
    hex::encode(&point.as_bytes()[1..])
}

fn decode_public_key(public_key_hex: &str) -> Result<VerifyingKey, BlockchainError> {
    let raw = hex::decode(public_key_hex)
        .map_err(|e| BlockchainError::CryptographicError(e.to_string()))?;
    if raw.len() != 64 {
        return Err(BlockchainError::CryptographicError(
            "public key must be 64 raw bytes (128 hex chars)".to_string(),
        ));
    }
    let mut tagged = Vec::with_capacity(65);
    tagged.push(0x04);
    tagged.extend_from_slice(&raw);
    VerifyingKey::from_sec1_bytes(&tagged)
        .map_err(|e| BlockchainError::CryptographicError(e.to_string()))
}

/// Signs the UTF-8 bytes of `message_text` with `private_key_hex`, returning
/// the raw `r || s` signature as lowercase hex.
///
/// # Errors
///
/// Returns [`BlockchainError::CryptographicError`] if the private key hex is
/// malformed.
pub fn create_digital_signature(
    message_text: &str,
    private_key_hex: &str,
) -> Result<SignatureHex, BlockchainError> {
    let mut key_bytes =
        hex::decode(private_key_hex).map_err(|e| BlockchainError::CryptographicError(e.to_string()))?;
    let signing_key = SigningKey::from_bytes((&key_bytes[..]).into())
        .map_err(|e| BlockchainError::CryptographicError(e.to_string()));
    key_bytes.zeroize();
    let signing_key = signing_key?;

    let signature: Signature = signing_key.sign(message_text.as_bytes());
    Ok(hex::encode(signature.to_bytes()))
}

/// Verifies `signature_hex` over the UTF-8 bytes of `message_text` under
/// `public_key_hex`. Any malformed input or cryptographic failure is a
/// rejection (`Ok(false)`), never a panic.
#[must_use]
pub fn verify_signature(message_text: &str, signature_hex: &str, public_key_hex: &str) -> bool {
    let Ok(verifying_key) = decode_public_key(public_key_hex) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&sig_bytes) else {
        return false;
    };
    verifying_key.verify(message_text.as_bytes(), &signature).is_ok()
}

/// `RIPEMD160(SHA256(utf8(data)))`, lowercase hex (40 chars). The input is
/// the *textual* representation of the data (e.g. a public key's hex
/// string), not its raw bytes — this mirrors `double_sha256`'s quirk of
/// hashing over hex text, and must be preserved to keep addresses
/// round-trippable with the original simulation.
#[must_use]
pub fn compute_hash160(data: &str) -> String {
    let sha256_digest = Sha256::digest(data.as_bytes());
    let ripemd_digest = Ripemd160::digest(sha256_digest);
    hex::encode(ripemd_digest)
}
