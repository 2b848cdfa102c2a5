//! Content hashing and nonce generation
//!
//! SHA-256 throughout, rendered as lowercase hex. The chain never
//! compares raw bytes; digests travel as hex strings so the persisted
//! text layout and the in-memory representation agree exactly.

use sha2::{Digest as _, Sha256};

/// Required leading hex characters of every accepted block digest
/// (the proof-of-work target). Two hex chars = 8 bits of difficulty,
/// ~256 expected mining attempts.
pub const DIFFICULTY_PREFIX: &str = "00";

/// Random bytes drawn per mining attempt (rendered as 2x hex chars).
pub const NONCE_BYTES: usize = 4;

/// SHA-256 of the empty byte string. Conventional "previous digest"
/// for a genesis block.
pub const NULL_DIGEST: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Hash arbitrary bytes to a 64-char lowercase hex digest.
pub fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Draw a fresh random nonce as a fixed-width hex string.
pub fn random_nonce() -> String {
    hex::encode(rand::random::<[u8; NONCE_BYTES]>())
}
