//! Core ledger components
//!
//! This module contains the fundamental building blocks:
//! - Transactions (transfers and mining rewards)
//! - Blocks (hash-linked, with proof of work)
//! - Ledger (chain, pending pool, balances, validation)
//! - Consensus (longest valid chain selection)

pub mod block;
pub mod blockchain;
pub mod config;
pub mod consensus;
pub mod transaction;

pub use block::{Block, CANCEL_CHECK_INTERVAL, GENESIS_PREVIOUS_HASH};
pub use blockchain::{validate_links, ChainStats, Ledger, LedgerError};
pub use config::{LedgerConfig, DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD, MAX_DIFFICULTY};
pub use consensus::ConsensusResolver;
pub use transaction::{Transaction, TransactionError};
