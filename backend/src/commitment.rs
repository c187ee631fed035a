//! Salted equality commitments.
//!
//! A participant never sends their secret. They send
//! `sha256_hex(sha256_hex(secret) ++ salt)`, where the salt travels only in
//! the invite link fragment. Both peers hashing the same secret with the same
//! salt arrive at the same commitment; the server just compares strings.

use std::fmt;

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::MalformedInput;

/// Salt size in bytes (128 bits).
pub const SALT_BYTES: usize = 16;

/// Length of a commitment on the wire: a hex-encoded SHA-256 digest.
pub const COMMITMENT_HEX_LEN: usize = 64;

fn is_lower_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn sha256_hex(input: &[u8]) -> String {
    base16ct::lower::encode_string(&Sha256::digest(input))
}

/// Comparison salt shared between the two participants out of band.
#[derive(Clone, PartialEq, Eq)]
pub struct Salt(String);

impl Salt {
    /// Draw a fresh 128-bit salt, rendered as lowercase hex.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SALT_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(base16ct::lower::encode_string(&bytes))
    }

    pub fn parse(s: &str) -> Result<Self, MalformedInput> {
        if is_lower_hex(s, SALT_BYTES * 2) {
            Ok(Self(s.to_owned()))
        } else {
            Err(MalformedInput::Salt)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Keep salts out of logs.
impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Salt(..)")
    }
}

/// The value a participant submits in place of their secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Commitment(String);

impl Commitment {
    /// Compute `H(H(secret) ++ salt)` over the hex renderings.
    pub fn derive(secret: &str, salt: &Salt) -> Self {
        let inner = sha256_hex(secret.as_bytes());
        let outer = sha256_hex(format!("{inner}{}", salt.as_str()).as_bytes());
        Self(outer)
    }

    pub fn parse(s: &str) -> Result<Self, MalformedInput> {
        if is_lower_hex(s, COMMITMENT_HEX_LEN) {
            Ok(Self(s.to_owned()))
        } else {
            Err(MalformedInput::Commitment)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
