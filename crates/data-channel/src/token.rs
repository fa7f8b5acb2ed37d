//! Room token derivation and validation.

use sha2::{Digest, Sha256};

use crate::wire::TOKEN_LEN;

/// Derives the 32-character hex handshake token for a room name.
///
/// Both peers must pass the same (already normalised) room name.
pub fn room_token(room: &str) -> String {
    let digest = Sha256::digest(room.as_bytes());
    hex::encode(&digest[..TOKEN_LEN / 2])
}

/// Validates a received token against the expected value.
///
/// Uses constant-time comparison.
pub fn validate_token(received: &str, expected: &str) -> bool {
    if received.len() != expected.len() {
        return false;
    }
    let mut diff = 0u8;
    for (a, b) in received.bytes().zip(expected.bytes()) {
        diff |= a ^ b;
    }
    diff == 0
}
