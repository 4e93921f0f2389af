// src/cache/fingerprint.rs

use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 digest over an ordered list of fields
///
/// Each field is length-prefixed, so `("ab", "c")` and `("a", "bc")`
/// produce different fingerprints.
#[derive(Clone)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    /// Hash a single string
    pub fn of(value: &str) -> String {
        Self::new().field(value).finish()
    }

    pub fn field(mut self, value: impl fmt::Display) -> Self {
        let value = value.to_string();
        self.hasher.update((value.len() as u64).to_le_bytes());
        self.hasher.update(value.as_bytes());
        self
    }

    /// Lowercase hex digest
    pub fn finish(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

impl Default for Fingerprint {
    fn default() -> Self {
        Self::new()
    }
}
