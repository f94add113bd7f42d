//! Fixed pay-to-public-key-hash script verification.
//!
//! Unlike a general Bitcoin-style script interpreter, the simulation only
//! ever runs one script shape, so there is no opcode stack machine here —
//! just the one check, grounded directly in
//! `original_source/script_engine.py::execute_p2pkh`.
//!
//! A spending input's `unlocking_script` is the concatenation of a 128-hex-
//! char (64-byte) signature and the spender's public key hex. Verification
//! recomputes the spender's hash160 from the embedded public key and checks
//! it against the output's locking script, then verifies the signature
//! against the *previous transaction id* as the signed message — not a full
//! sighash over the spending transaction.

use shared::crypto;

/// Byte length, in hex characters, of the embedded ECDSA signature.
const SIGNATURE_HEX_LEN: usize = 128;

/// Verifies a pay-to-public-key-hash spend.
///
/// `unlocking_script` is `signature_hex || public_key_hex`; `locking_script`
/// is the hash160 the output was paid to; `message` is the previous
/// transaction id being signed over.
///
/// Any malformed input (wrong lengths, bad hex) is treated as a failed
/// script rather than an error, matching the original's `except: return
/// False` fallback.
#[must_use]
pub fn execute_p2pkh(unlocking_script: &str, locking_script: &str, message: &str) -> bool {
    if unlocking_script.len() <= SIGNATURE_HEX_LEN {
        return false;
    }
    let (signature_hex, public_key_hex) = unlocking_script.split_at(SIGNATURE_HEX_LEN);

    let derived_hash = crypto::compute_hash160(public_key_hex);
    if derived_hash.trim() != locking_script.trim() {
        return false;
    }

    crypto::verify_signature(message, signature_hex, public_key_hex)
}

/// Builds an `unlocking_script` from a signature and public key, the way a
/// spender assembles one before broadcasting a transaction.
#[must_use]
pub fn build_unlocking_script(signature_hex: &str, public_key_hex: &str) -> String {
    format!("{signature_hex}{public_key_hex}")
}
