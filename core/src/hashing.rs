//! Double-SHA256 over hex text, byte-order inversion, and Merkle root
//! computation.
//!
//! All three routines are grounded directly in
//! `original_source/helpers.py`. The hashing primitive in particular has a
//! deliberate quirk that must survive the port unchanged: it hashes the
//! *hexadecimal text* of its input, not raw bytes. A caller builds up a hex
//! string (a serialized header, a concatenation of two child hashes, …) and
//! `double_sha256` treats that string as UTF-8 text at every step, including
//! the second hash of the first hash's hex digest.

use shared::Hash;

/// `SHA256(SHA256(text))`, both rounds over the UTF-8 bytes of hex text
/// rather than raw binary. Mirrors `helpers.compute_double_sha256`.
#[must_use]
pub fn double_sha256(text: &str) -> Hash {
    use sha2::{Digest, Sha256};

    let first_digest = Sha256::digest(text.as_bytes());
    let first_hex = hex::encode(first_digest);
    let second_digest = Sha256::digest(first_hex.as_bytes());
    let second_hex = hex::encode(second_digest);

    Hash::from_digest_unchecked(second_hex)
}

/// Reverses the byte order of a hex string (big-endian <-> little-endian),
/// returning uppercase hex. Odd-length input is left-padded with a `0`
/// nibble before reversing, matching `bytearray.fromhex` semantics applied
/// to a byte-aligned string. Mirrors `helpers.invert_bytes`.
#[must_use]
pub fn invert_bytes(hex_string: &str) -> String {
    let padded;
    let even_hex = if hex_string.len() % 2 == 0 {
        hex_string
    } else {
        padded = format!("0{hex_string}");
        &padded
    };

    let mut bytes = hex::decode(even_hex).unwrap_or_default();
    bytes.reverse();
    hex::encode_upper(bytes)
}

/// Recursively folds a list of hashes into a single Merkle root using
/// `double_sha256` as the combining function, with configurable arity
/// (the simulation defaults to 2). Returns `None` for an empty input.
///
/// When only one hash remains, the root is `double_sha256(hash + hash)` —
/// the lone survivor is hashed against itself once more rather than
/// returned directly. Mirrors `helpers.compute_merkle_root`.
#[must_use]
pub fn merkle_root(hashes: &[Hash], arity: usize) -> Option<Hash> {
    if hashes.is_empty() {
        return None;
    }
    if hashes.len() == 1 {
        let doubled = format!("{h}{h}", h = hashes[0]);
        return Some(double_sha256(&doubled));
    }

    let mut level: Vec<Hash> = hashes.to_vec();
    let remainder = level.len() % arity;
    if remainder != 0 {
        let last = level.last().cloned().unwrap_or_default();
        for _ in 0..remainder {
            level.push(last.clone());
        }
    }

    let mut next_level = Vec::with_capacity(level.len().div_ceil(arity));
    for group in level.chunks(arity) {
        let combined: String = group.iter().map(ToString::to_string).collect();
        next_level.push(double_sha256(&combined));
    }

    merkle_root(&next_level, arity)
}
