//! Cryptographic utilities for the ledger
//!
//! This module provides SHA-256 hashing over a canonical field encoding
//! and the leading-zero proof-of-work check.

pub mod hash;

pub use hash::{meets_difficulty, sha256, sha256_hex, CanonicalHasher, HASH_HEX_LEN};
