//! PoW Ledger: a minimal append-only proof-of-work ledger in Rust
//!
//! This crate provides:
//! - SHA-256 block hashing over a canonical field encoding
//! - Proof of Work with leading-zero hex difficulty
//! - Account-style balances replayed from the chain
//! - Tamper and linkage validation
//! - Longest-valid-chain consensus between peers
//! - A pluggable peer transport with an in-process implementation
//! - JSON persistence with backups
//!
//! # Example
//!
//! ```rust
//! use pow_ledger::core::{Ledger, LedgerConfig, Transaction};
//! use pow_ledger::mining::Miner;
//!
//! // Create a new ledger
//! let mut ledger = Ledger::new(LedgerConfig::with_difficulty(2)).unwrap();
//!
//! // Queue a transfer
//! ledger
//!     .queue_transaction(Transaction::new("alice", "bob", 10))
//!     .unwrap();
//!
//! // Mine a block
//! let miner = Miner::new("miner");
//! let (block, stats) = miner.mine_block(&mut ledger).unwrap();
//! println!("Mined block {} in {}ms", block.hash, stats.time_ms);
//!
//! // Check balance
//! assert_eq!(ledger.get_balance("bob").unwrap(), 10);
//! assert!(ledger.is_valid());
//! ```

pub mod cli;
pub mod core;
pub mod crypto;
pub mod mining;
pub mod network;
pub mod storage;

// Re-export commonly used types
pub use core::{
    Block, ConsensusResolver, Ledger, LedgerConfig, LedgerError, Transaction,
    DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD,
};
pub use mining::{Miner, MiningStats};
pub use network::{LocalNetwork, Node, NullTransport, PeerTransport};
pub use storage::{Storage, StorageConfig};
