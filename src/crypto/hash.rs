//! Cryptographic hashing utilities for the ledger
//!
//! Provides the SHA-256 digest used for block hashes and transaction
//! identities, a canonical field encoder that keeps those digests
//! unambiguous, and the proof-of-work target check.

use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest
pub const HASH_HEX_LEN: usize = 64;

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Checks if a hex digest meets the difficulty target.
///
/// The first `difficulty` characters must all be `'0'`. A digest shorter
/// than `difficulty` never qualifies; a difficulty of zero always does.
pub fn meets_difficulty(hash_hex: &str, difficulty: usize) -> bool {
    hash_hex.len() >= difficulty && hash_hex.bytes().take(difficulty).all(|b| b == b'0')
}

/// Incremental SHA-256 over a canonical field encoding.
///
/// Every value is framed so that distinct field sequences can never produce
/// the same byte stream: strings carry a length prefix, integers are
/// fixed-width little-endian, and optional strings carry a presence tag.
#[derive(Clone, Default)]
pub struct CanonicalHasher {
    hasher: Sha256,
}

impl CanonicalHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_str(&mut self, value: &str) -> &mut Self {
        self.write_u64(value.len() as u64);
        self.hasher.update(value.as_bytes());
        self
    }

    pub fn write_opt_str(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            Some(s) => {
                self.hasher.update([1u8]);
                self.write_str(s)
            }
            None => {
                self.hasher.update([0u8]);
                self
            }
        }
    }

    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.hasher.update(value.to_le_bytes());
        self
    }

    pub fn write_i64(&mut self, value: i64) -> &mut Self {
        self.hasher.update(value.to_le_bytes());
        self
    }

    /// Prefix for a sequence of `len` elements that follow.
    pub fn write_len(&mut self, len: usize) -> &mut Self {
        self.write_u64(len as u64)
    }

    /// Consume the hasher and return the hex digest
    pub fn finish_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let data = b"hello world";
        let hash = sha256(data);
        assert_eq!(hash.len(), 32);
        assert_eq!(
            sha256_hex(data),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_meets_difficulty() {
        assert!(meets_difficulty("00ab", 2));
        assert!(meets_difficulty("00ab", 1));
        assert!(!meets_difficulty("00ab", 3));
        assert!(meets_difficulty("ffff", 0));
        assert!(!meets_difficulty("00", 3));
    }

    #[test]
    fn test_canonical_hasher_separates_fields() {
        let mut a = CanonicalHasher::new();
        a.write_str("a").write_str("bc");
        let mut b = CanonicalHasher::new();
        b.write_str("ab").write_str("c");
        assert_ne!(a.finish_hex(), b.finish_hex());
    }

    #[test]
    fn test_absent_differs_from_empty() {
        let mut absent = CanonicalHasher::new();
        absent.write_opt_str(None);
        let mut empty = CanonicalHasher::new();
        empty.write_opt_str(Some(""));
        assert_ne!(absent.finish_hex(), empty.finish_hex());
    }

    #[test]
    fn test_digest_is_hex_of_expected_length() {
        let mut hasher = CanonicalHasher::new();
        hasher.write_u64(7);
        let digest = hasher.finish_hex();
        assert_eq!(digest.len(), HASH_HEX_LEN);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
