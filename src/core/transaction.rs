//! Transaction handling for the ledger
//!
//! A transaction is an immutable record of a transfer between two
//! addresses. Reward payouts have no sender. There is no signature scheme:
//! the content hash identifies a transaction, it does not authorize it.

use crate::crypto::CanonicalHasher;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Transaction-related errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Transaction has no recipient")]
    MissingRecipient,
}

// =============================================================================
// Transaction
// =============================================================================

/// A transfer of `amount` from one address to another
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    /// Sender address, `None` for mining rewards
    pub from: Option<String>,
    /// Recipient address
    pub to: String,
    /// Amount transferred
    pub amount: u64,
    /// Creation time in Unix milliseconds
    pub created_at: i64,
}

impl Transaction {
    /// Create a transfer stamped with the current time
    pub fn new(from: &str, to: &str, amount: u64) -> Self {
        Self {
            from: Some(from.to_string()),
            to: to.to_string(),
            amount,
            created_at: Utc::now().timestamp_millis(),
        }
    }

    /// Create a mining reward payout
    pub fn reward(to: &str, amount: u64) -> Self {
        Self {
            from: None,
            to: to.to_string(),
            amount,
            created_at: Utc::now().timestamp_millis(),
        }
    }

    /// Whether this is a reward payout (no sender)
    pub fn is_reward(&self) -> bool {
        self.from.is_none()
    }

    /// Content hash over `(from, to, amount, created_at)`.
    ///
    /// Informational only; it is used to identify transactions, never to
    /// prove that the sender authorized the transfer.
    pub fn calculate_hash(&self) -> String {
        let mut hasher = CanonicalHasher::new();
        self.write_canonical(&mut hasher);
        hasher.finish_hex()
    }

    /// Feed this transaction's fields into a canonical hasher
    pub(crate) fn write_canonical(&self, hasher: &mut CanonicalHasher) {
        hasher
            .write_opt_str(self.from.as_deref())
            .write_str(&self.to)
            .write_u64(self.amount)
            .write_i64(self.created_at);
    }

    /// Same sender, recipient and amount, regardless of creation time.
    ///
    /// This is how a transaction mined by another node is matched against
    /// the local pending pool.
    pub fn matches_transfer(&self, other: &Transaction) -> bool {
        self.from == other.from && self.to == other.to && self.amount == other.amount
    }

    /// Structural checks applied when queueing
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.to.is_empty() {
            return Err(TransactionError::MissingRecipient);
        }
        Ok(())
    }
}
