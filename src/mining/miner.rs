//! Mining engine for the ledger
//!
//! Runs proof-of-work on block templates, either in place against a ledger
//! or detached from it so the ledger stays available while the search runs.

use crate::core::{Block, Ledger, LedgerError};
use log::info;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

/// Mining statistics
#[derive(Debug, Clone)]
pub struct MiningStats {
    /// Number of hash attempts
    pub hash_attempts: u64,
    /// Time taken in milliseconds
    pub time_ms: u128,
    /// Hash rate (hashes per second)
    pub hash_rate: f64,
}

impl MiningStats {
    fn measure(attempts: u64, start: Instant) -> Self {
        let elapsed = start.elapsed().as_millis();
        let hash_rate = if elapsed > 0 {
            (attempts as f64) / (elapsed as f64 / 1000.0)
        } else {
            attempts as f64
        };

        Self {
            hash_attempts: attempts,
            time_ms: elapsed,
            hash_rate,
        }
    }
}

/// Miner for creating new blocks
pub struct Miner {
    /// Address credited with the reward for each mined block
    pub address: String,
}

impl Miner {
    /// Create a new miner
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
        }
    }

    /// Mine the ledger's pending transactions into a new block
    pub fn mine_block(&self, ledger: &mut Ledger) -> Result<(Block, MiningStats), LedgerError> {
        ledger.ensure_valid()?;

        let start = Instant::now();
        let mut block = ledger.block_template();

        info!(
            "Mining block {} with difficulty {}...",
            ledger.len(),
            ledger.difficulty()
        );

        let attempts = block.mine(ledger.difficulty());
        let stats = MiningStats::measure(attempts, start);

        info!(
            "Block {} mined in {}ms ({} attempts, {:.2} H/s)",
            ledger.len(),
            stats.time_ms,
            attempts,
            stats.hash_rate
        );

        let block = ledger.commit_mined_block(block, &self.address)?.clone();
        Ok((block, stats))
    }

    /// Mine a block without holding the ledger (for async/concurrent use)
    ///
    /// Takes a template from [`Ledger::block_template`], performs the
    /// CPU-intensive search and returns the mined block, or `None` once
    /// `cancel` is raised. The caller commits the block under a write lock.
    pub fn mine_detached(
        &self,
        mut block: Block,
        difficulty: usize,
        cancel: &AtomicBool,
    ) -> Option<(Block, MiningStats)> {
        let start = Instant::now();

        info!(
            "Mining on top of {} with difficulty {}...",
            block.previous_hash, difficulty
        );

        let Some(attempts) = block.mine_until(difficulty, cancel) else {
            info!("Mining on top of {} cancelled", block.previous_hash);
            return None;
        };

        let stats = MiningStats::measure(attempts, start);
        info!(
            "Block {} mined in {}ms ({} attempts, {:.2} H/s)",
            block.hash, stats.time_ms, attempts, stats.hash_rate
        );

        Some((block, stats))
    }

    /// Mine several blocks in a row
    pub fn mine_continuously(
        &self,
        ledger: &mut Ledger,
        num_blocks: u64,
    ) -> Result<Vec<(Block, MiningStats)>, LedgerError> {
        (0..num_blocks).map(|_| self.mine_block(ledger)).collect()
    }
}
