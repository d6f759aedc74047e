use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use sha2::{Digest, Sha256};

/// Number of random bytes behind an authorization `state` value.
pub const STATE_BYTES: usize = 32;

/// Generates an unguessable `state` value for one authorization attempt:
/// 32 bytes from the thread-local CSPRNG, base64url without padding.
pub fn generate_state() -> String {
    let bytes: [u8; STATE_BYTES] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compares an echoed `state` against the expected one without leaking the
/// position of the first differing byte. Both sides are hashed first so the
/// comparison always runs over 32 bytes.
pub fn states_match(received: &str, expected: &str) -> bool {
    let a = Sha256::digest(received.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
