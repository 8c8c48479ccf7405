//! Block implementation for the ledger
//!
//! A block is an ordered batch of transactions linked to its predecessor by
//! hash. Blocks own the proof-of-work search over their nonce.

use crate::core::transaction::Transaction;
use crate::crypto::{meets_difficulty, CanonicalHasher};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Previous-hash sentinel carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// How many nonces `mine_until` tries between cancellation checks
pub const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// A block in the chain.
///
/// Field order matches the persisted layout: timestamp, transactions,
/// previous hash, nonce, hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    /// Creation time in Unix milliseconds
    pub timestamp: i64,
    /// Transactions in insertion order
    pub transactions: Vec<Transaction>,
    /// Hash of the predecessor block
    pub previous_hash: String,
    /// Proof-of-work counter
    pub nonce: u64,
    /// Cached digest of the header fields
    pub hash: String,
}

impl Block {
    /// Create a new block (unmined)
    pub fn new(timestamp: i64, transactions: Vec<Transaction>, previous_hash: String) -> Self {
        let mut block = Self {
            timestamp,
            transactions,
            previous_hash,
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.calculate_hash();
        block
    }

    /// Create a block stamped with the current time
    pub fn next(transactions: Vec<Transaction>, previous_hash: String) -> Self {
        Self::new(Utc::now().timestamp_millis(), transactions, previous_hash)
    }

    /// Create the genesis block. It is never mined.
    pub fn genesis(timestamp: i64) -> Self {
        Self::new(timestamp, Vec::new(), GENESIS_PREVIOUS_HASH.to_string())
    }

    pub fn is_genesis(&self) -> bool {
        self.previous_hash == GENESIS_PREVIOUS_HASH
    }

    /// Digest over `(previous_hash, timestamp, transactions, nonce)`
    pub fn calculate_hash(&self) -> String {
        let mut hasher = CanonicalHasher::new();
        hasher
            .write_str(&self.previous_hash)
            .write_i64(self.timestamp)
            .write_len(self.transactions.len());
        for tx in &self.transactions {
            tx.write_canonical(&mut hasher);
        }
        hasher.write_u64(self.nonce);
        hasher.finish_hex()
    }

    /// Search nonces until the hash meets `difficulty`.
    ///
    /// Returns the number of hashes computed. Runs to completion; use
    /// [`Block::mine_until`] when the search must be abandonable.
    pub fn mine(&mut self, difficulty: usize) -> u64 {
        let mut attempts = 0u64;

        while !meets_difficulty(&self.hash, difficulty) {
            self.nonce = self.nonce.wrapping_add(1);
            self.hash = self.calculate_hash();
            attempts += 1;
        }

        attempts
    }

    /// Like [`Block::mine`], but gives up once `cancel` is set.
    ///
    /// Returns `Some(attempts)` when the block was mined and `None` when it
    /// was cancelled. A cancelled block must be thrown away.
    pub fn mine_until(&mut self, difficulty: usize, cancel: &AtomicBool) -> Option<u64> {
        let mut attempts = 0u64;

        while !meets_difficulty(&self.hash, difficulty) {
            if attempts % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
                return None;
            }
            self.nonce = self.nonce.wrapping_add(1);
            self.hash = self.calculate_hash();
            attempts += 1;
        }

        Some(attempts)
    }

    /// Verify the cached hash against a fresh recomputation
    pub fn verify_hash(&self) -> bool {
        self.hash == self.calculate_hash()
    }

    /// Check the cached hash against the proof-of-work target
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        meets_difficulty(&self.hash, difficulty)
    }

    /// Get number of transactions in this block
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}
