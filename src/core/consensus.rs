//! Longest-valid-chain consensus
//!
//! Candidate chains gathered from peers are compared against the local
//! ledger. The longest candidate that shares the local genesis block and
//! passes the tamper and linkage checks replaces the local chain, provided
//! it is strictly longer. Ties keep the incumbent.

use crate::core::block::Block;
use crate::core::blockchain::{validate_links, Ledger};

/// Fork choice by plain chain length
pub struct ConsensusResolver;

impl ConsensusResolver {
    /// Whether `candidate` starts from `genesis` and links up cleanly
    pub fn is_valid_chain(genesis: &Block, candidate: &[Block]) -> bool {
        match candidate.first() {
            Some(first) if first == genesis => validate_links(candidate),
            _ => false,
        }
    }

    /// Index of the longest valid candidate strictly longer than `local_len`.
    ///
    /// Among equally long winners the first one seen is kept.
    pub fn select_longest(
        genesis: &Block,
        local_len: usize,
        candidates: &[Vec<Block>],
    ) -> Option<usize> {
        let mut max_len = local_len;
        let mut best = None;

        for (index, candidate) in candidates.iter().enumerate() {
            if candidate.len() <= max_len {
                continue;
            }
            if !Self::is_valid_chain(genesis, candidate) {
                log::debug!(
                    "Excluding candidate chain {} (length {}): failed validation",
                    index,
                    candidate.len()
                );
                continue;
            }
            max_len = candidate.len();
            best = Some(index);
        }

        best
    }

    /// Adopt the best candidate, if any. Returns whether the chain changed.
    pub fn resolve(ledger: &mut Ledger, mut candidates: Vec<Vec<Block>>) -> bool {
        let local_len = ledger.len();

        match Self::select_longest(ledger.genesis_block(), local_len, &candidates) {
            Some(index) => {
                let chain = candidates.swap_remove(index);
                log::info!(
                    "Replacing local chain (length {}) with longer chain (length {})",
                    local_len,
                    chain.len()
                );
                ledger.replace_chain(chain);
                true
            }
            None => {
                log::info!("Local chain (length {}) is already the longest", local_len);
                false
            }
        }
    }
}
