//! Ledger implementation
//!
//! The ledger owns the chain of blocks, the pool of pending transactions
//! and the transport used to announce newly mined blocks.

use crate::core::block::Block;
use crate::core::config::LedgerConfig;
use crate::core::transaction::{Transaction, TransactionError};
use crate::network::transport::{NullTransport, PeerTransport};
use chrono::Utc;
use serde::{Deserialize, Serialize, Serializer};
use std::sync::Arc;
use thiserror::Error;

/// Ledger-related errors
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Local chain failed validation; refusing to continue")]
    CorruptLocalState,
    #[error("Mined block is stale: tip is {expected}, block extends {found}")]
    StaleBlock { expected: String, found: String },
    #[error("Block does not meet difficulty {0}")]
    InsufficientWork(usize),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Ledger has no genesis block")]
    EmptyChain,
    #[error("Transaction rejected: {0}")]
    Transaction(#[from] TransactionError),
}

/// Check the tamper and linkage properties of every block after the first.
///
/// Proof of work is not re-checked here; only the received-block
/// path enforces difficulty.
pub fn validate_links(chain: &[Block]) -> bool {
    chain.windows(2).all(|pair| {
        let (previous, current) = (&pair[0], &pair[1]);
        current.verify_hash() && current.previous_hash == previous.hash
    })
}

/// The ledger: chain, pending pool and configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "LedgerRecord")]
pub struct Ledger {
    config: LedgerConfig,
    chain: Vec<Block>,
    pending_transactions: Vec<Transaction>,
    transport: Arc<dyn PeerTransport>,
}

impl Ledger {
    /// Create a ledger holding only a fresh genesis block
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        let genesis = Self::create_genesis_block(&config);
        Ok(Self {
            config,
            chain: vec![genesis],
            pending_transactions: Vec::new(),
            transport: Arc::new(NullTransport),
        })
    }

    /// Build the genesis block for `config`.
    ///
    /// Uses the configured genesis timestamp when there is one, otherwise
    /// the current time.
    pub fn create_genesis_block(config: &LedgerConfig) -> Block {
        let timestamp = config
            .genesis_timestamp
            .unwrap_or_else(|| Utc::now().timestamp_millis());
        Block::genesis(timestamp)
    }

    /// Attach the transport used to announce mined blocks
    pub fn with_transport(mut self, transport: Arc<dyn PeerTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn set_transport(&mut self, transport: Arc<dyn PeerTransport>) {
        self.transport = transport;
    }

    pub fn transport(&self) -> Arc<dyn PeerTransport> {
        self.transport.clone()
    }

    /// Peers known to the attached transport
    pub fn known_peers(&self) -> Vec<String> {
        self.transport.known_peers()
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn difficulty(&self) -> usize {
        self.config.difficulty
    }

    pub fn mining_reward(&self) -> u64 {
        self.config.mining_reward
    }

    /// All blocks, genesis first
    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    /// Number of blocks including genesis
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Always false: a ledger holds at least its genesis block
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Get blockchain height (genesis = 0)
    pub fn height(&self) -> u64 {
        self.chain.len() as u64 - 1
    }

    pub fn genesis_block(&self) -> &Block {
        &self.chain[0]
    }

    /// Get the latest block
    pub fn latest_block(&self) -> &Block {
        &self.chain[self.chain.len() - 1]
    }

    /// Get a block by index
    pub fn get_block(&self, index: u64) -> Option<&Block> {
        self.chain.get(index as usize)
    }

    /// Get a block by hash
    pub fn get_block_by_hash(&self, hash: &str) -> Option<&Block> {
        self.chain.iter().find(|b| b.hash == hash)
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    /// Add a transaction to the pending pool.
    ///
    /// Only structural checks apply; sender balances are not consulted.
    pub fn queue_transaction(&mut self, tx: Transaction) -> Result<(), LedgerError> {
        tx.validate()?;
        self.pending_transactions.push(tx);
        Ok(())
    }

    /// An unmined block carrying the pending pool on top of the current tip
    pub fn block_template(&self) -> Block {
        Block::next(
            self.pending_transactions.clone(),
            self.latest_block().hash.clone(),
        )
    }

    /// Append a block mined from [`Ledger::block_template`].
    ///
    /// The tip is re-checked here, so a block mined against a tip that has
    /// since been replaced is refused with [`LedgerError::StaleBlock`] and the
    /// ledger is left untouched. On success the mined transactions leave the
    /// pending pool, a reward for `reward_address` is queued and the block is
    /// broadcast.
    pub fn commit_mined_block(
        &mut self,
        block: Block,
        reward_address: &str,
    ) -> Result<&Block, LedgerError> {
        let tip = &self.latest_block().hash;
        if block.previous_hash != *tip {
            return Err(LedgerError::StaleBlock {
                expected: tip.clone(),
                found: block.previous_hash,
            });
        }
        if !block.verify_hash() || !block.meets_difficulty(self.config.difficulty) {
            return Err(LedgerError::InsufficientWork(self.config.difficulty));
        }

        self.pending_transactions
            .retain(|tx| !block.transactions.contains(tx));
        self.pending_transactions.push(Transaction::reward(
            reward_address,
            self.config.mining_reward,
        ));

        let index = self.chain.len();
        self.chain.push(block);
        let block = &self.chain[index];

        log::info!(
            "Block {} mined with {} transaction(s): {}",
            index,
            block.tx_count(),
            block.hash
        );
        self.transport.broadcast_block(block);

        Ok(block)
    }

    /// Package the pending pool into a block, mine it and append it.
    pub fn mine_pending_transactions(&mut self, reward_address: &str) -> Result<Block, LedgerError> {
        self.ensure_valid()?;

        let mut block = self.block_template();
        log::info!(
            "Mining block {} with difficulty {}...",
            self.chain.len(),
            self.config.difficulty
        );
        block.mine(self.config.difficulty);

        self.commit_mined_block(block, reward_address).cloned()
    }

    /// Replay the whole chain and sum credits minus debits for `address`.
    ///
    /// Balances may be negative; this is a record, not a spend check.
    pub fn replay_balance(&self, address: &str) -> i128 {
        let mut balance: i128 = 0;

        for block in &self.chain {
            for tx in &block.transactions {
                if tx.from.as_deref() == Some(address) {
                    balance -= tx.amount as i128;
                }
                if tx.to == address {
                    balance += tx.amount as i128;
                }
            }
        }

        balance
    }

    /// Balance of `address`, refused when the local chain is corrupt
    pub fn get_balance(&self, address: &str) -> Result<i128, LedgerError> {
        self.ensure_valid()?;
        Ok(self.replay_balance(address))
    }

    /// Validate the entire chain (tamper and linkage checks)
    pub fn is_valid(&self) -> bool {
        validate_links(&self.chain)
    }

    /// Surface local corruption as an error
    pub fn ensure_valid(&self) -> Result<(), LedgerError> {
        if self.is_valid() {
            Ok(())
        } else {
            log::error!("Local chain failed validation at height {}", self.height());
            Err(LedgerError::CorruptLocalState)
        }
    }

    /// Accept a block mined by a peer if it extends the local tip.
    ///
    /// Returns `false` without touching the ledger when the block does not
    /// link to the tip, lacks the required work or carries a hash that does
    /// not match its contents. Accepted transactions are dropped from the
    /// pending pool by `(from, to, amount)`.
    pub fn receive_block(&mut self, block: Block, sender: &str) -> bool {
        if block.previous_hash != self.latest_block().hash {
            log::warn!("Rejected block from {}: previous hash mismatch", sender);
            return false;
        }

        if !block.meets_difficulty(self.config.difficulty) {
            log::warn!("Rejected block from {}: invalid proof of work", sender);
            return false;
        }

        if !block.verify_hash() {
            log::warn!("Rejected block from {}: hash does not match contents", sender);
            return false;
        }

        self.pending_transactions.retain(|pending| {
            !block
                .transactions
                .iter()
                .any(|mined| mined.matches_transfer(pending))
        });

        log::info!("Accepted block {} from {}", block.hash, sender);
        self.chain.push(block);
        true
    }

    /// Swap in a chain already vetted by the consensus resolver
    pub(crate) fn replace_chain(&mut self, chain: Vec<Block>) {
        self.chain = chain;
    }

    /// Get chain statistics
    pub fn stats(&self) -> ChainStats {
        let total_transactions: usize = self.chain.iter().map(|b| b.transactions.len()).sum();
        let total_issued: u128 = self
            .chain
            .iter()
            .flat_map(|b| &b.transactions)
            .filter(|tx| tx.is_reward())
            .map(|tx| tx.amount as u128)
            .sum();

        ChainStats {
            height: self.height(),
            total_blocks: self.chain.len() as u64,
            total_transactions: total_transactions as u64,
            total_issued,
            pending_transactions: self.pending_transactions.len(),
            difficulty: self.config.difficulty,
            latest_hash: self.latest_block().hash.clone(),
        }
    }
}

impl Default for Ledger {
    fn default() -> Self {
        let config = LedgerConfig::default();
        let genesis = Self::create_genesis_block(&config);
        Self {
            config,
            chain: vec![genesis],
            pending_transactions: Vec::new(),
            transport: Arc::new(NullTransport),
        }
    }
}

/// Chain statistics
#[derive(Debug, Clone)]
pub struct ChainStats {
    pub height: u64,
    pub total_blocks: u64,
    pub total_transactions: u64,
    pub total_issued: u128,
    pub pending_transactions: usize,
    pub difficulty: usize,
    pub latest_hash: String,
}

// =============================================================================
// Persisted form
// =============================================================================

#[derive(Serialize)]
struct LedgerView<'a> {
    config: &'a LedgerConfig,
    chain: &'a [Block],
    pending_transactions: &'a [Transaction],
}

#[derive(Deserialize)]
struct LedgerRecord {
    config: LedgerConfig,
    chain: Vec<Block>,
    #[serde(default)]
    pending_transactions: Vec<Transaction>,
}

impl Serialize for Ledger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        LedgerView {
            config: &self.config,
            chain: &self.chain,
            pending_transactions: &self.pending_transactions,
        }
        .serialize(serializer)
    }
}

impl TryFrom<LedgerRecord> for Ledger {
    type Error = LedgerError;

    fn try_from(record: LedgerRecord) -> Result<Self, Self::Error> {
        record.config.validate()?;
        if record.chain.is_empty() {
            return Err(LedgerError::EmptyChain);
        }
        Ok(Self {
            config: record.config,
            chain: record.chain,
            pending_transactions: record.pending_transactions,
            transport: Arc::new(NullTransport),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn ledger(difficulty: usize) -> Ledger {
        Ledger::new(LedgerConfig::with_difficulty(difficulty)).unwrap()
    }

    #[derive(Debug, Default)]
    struct RecordingTransport {
        broadcast: Mutex<Vec<String>>,
    }

    impl PeerTransport for RecordingTransport {
        fn broadcast_block(&self, block: &Block) {
            self.broadcast.lock().unwrap().push(block.hash.clone());
        }

        fn fetch_peer_chains(&self) -> futures::future::BoxFuture<'_, Vec<Vec<Block>>> {
            Box::pin(async { Vec::new() })
        }
    }

    #[test]
    fn test_new_ledger() {
        let ledger = ledger(2);
        assert_eq!(ledger.len(), 1);
        assert!(ledger.genesis_block().is_genesis());
        assert!(ledger.genesis_block().transactions.is_empty());
        assert_eq!(ledger.latest_block(), ledger.genesis_block());
        assert!(ledger.is_valid());
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            Ledger::new(LedgerConfig::with_difficulty(0)),
            Err(LedgerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_queue_rejects_missing_recipient() {
        let mut ledger = ledger(1);
        let result = ledger.queue_transaction(Transaction::new("alice", "", 5));
        assert!(matches!(result, Err(LedgerError::Transaction(_))));
        assert!(ledger.pending_transactions().is_empty());
    }

    #[test]
    fn test_mine_single_transfer() {
        let mut ledger = ledger(2);
        ledger
            .queue_transaction(Transaction::new("A", "B", 10))
            .unwrap();

        let block = ledger.mine_pending_transactions("M").unwrap();

        assert_eq!(ledger.len(), 2);
        assert!(block.meets_difficulty(2));
        assert_eq!(block.previous_hash, ledger.genesis_block().hash);
        assert_eq!(ledger.get_balance("B").unwrap(), 10);
        assert_eq!(ledger.get_balance("A").unwrap(), -10);
        // The reward is only queued until the next block is mined.
        assert_eq!(ledger.get_balance("M").unwrap(), 0);
        assert_eq!(ledger.pending_transactions().len(), 1);
        assert!(ledger.pending_transactions()[0].is_reward());
        assert_eq!(ledger.pending_transactions()[0].to, "M");
    }

    #[test]
    fn test_second_mine_pays_first_reward() {
        let mut ledger = ledger(1);
        ledger.mine_pending_transactions("M").unwrap();
        ledger.mine_pending_transactions("M").unwrap();

        assert_eq!(ledger.len(), 3);
        assert_eq!(
            ledger.get_balance("M").unwrap(),
            ledger.mining_reward() as i128
        );
    }

    #[test]
    fn test_tampered_amount_invalidates_chain() {
        let mut ledger = ledger(1);
        ledger
            .queue_transaction(Transaction::new("A", "B", 10))
            .unwrap();
        ledger.mine_pending_transactions("M").unwrap();
        ledger.mine_pending_transactions("M").unwrap();
        assert!(ledger.is_valid());

        ledger.chain[1].transactions[0].amount = 1_000;

        assert!(!ledger.is_valid());
        assert!(matches!(
            ledger.get_balance("B"),
            Err(LedgerError::CorruptLocalState)
        ));
        assert!(matches!(
            ledger.mine_pending_transactions("M"),
            Err(LedgerError::CorruptLocalState)
        ));
    }

    #[test]
    fn test_broken_link_invalidates_chain() {
        let mut ledger = ledger(1);
        ledger.mine_pending_transactions("M").unwrap();
        ledger.mine_pending_transactions("M").unwrap();

        let mut forged = ledger.chain[2].clone();
        forged.previous_hash = "f".repeat(64);
        forged.hash = forged.calculate_hash();
        ledger.chain[2] = forged;

        assert!(!ledger.is_valid());
    }

    #[test]
    fn test_historic_difficulty_not_rechecked() {
        let mut ledger = ledger(1);
        let block = Block::next(Vec::new(), ledger.latest_block().hash.clone());
        // Appended without mining: linkage and hash are intact.
        ledger.chain.push(block);
        assert!(ledger.is_valid());
    }

    #[test]
    fn test_conservation_of_value() {
        let mut ledger = ledger(1);
        ledger
            .queue_transaction(Transaction::new("A", "B", 10))
            .unwrap();
        ledger.mine_pending_transactions("M").unwrap();
        ledger
            .queue_transaction(Transaction::new("M", "C", 40))
            .unwrap();
        ledger
            .queue_transaction(Transaction::new("B", "A", 3))
            .unwrap();
        ledger.mine_pending_transactions("N").unwrap();
        ledger.mine_pending_transactions("M").unwrap();

        let addresses = ["A", "B", "C", "M", "N"];
        let total: i128 = addresses
            .iter()
            .map(|a| ledger.get_balance(a).unwrap())
            .sum();
        assert_eq!(total, ledger.stats().total_issued as i128);
        assert_eq!(ledger.stats().total_issued, 200);
    }

    #[test]
    fn test_balance_ignores_order_within_block() {
        let txs = vec![
            Transaction::new("A", "B", 7),
            Transaction::new("B", "C", 2),
            Transaction::reward("A", 100),
        ];
        let mut forward = ledger(1);
        let mut reversed = forward.clone();
        for tx in txs.iter().cloned() {
            forward.queue_transaction(tx).unwrap();
        }
        for tx in txs.iter().rev().cloned() {
            reversed.queue_transaction(tx).unwrap();
        }
        forward.mine_pending_transactions("M").unwrap();
        reversed.mine_pending_transactions("M").unwrap();

        for address in ["A", "B", "C", "M"] {
            assert_eq!(
                forward.get_balance(address).unwrap(),
                reversed.get_balance(address).unwrap()
            );
        }
    }

    #[test]
    fn test_every_block_rehashes_to_stored_hash() {
        let mut ledger = ledger(1);
        for i in 0..3 {
            ledger
                .queue_transaction(Transaction::new("A", "B", i))
                .unwrap();
            ledger.mine_pending_transactions("M").unwrap();
        }
        for block in ledger.chain() {
            assert_eq!(block.calculate_hash(), block.hash);
        }
    }

    #[test]
    fn test_mined_block_is_broadcast() {
        let transport = Arc::new(RecordingTransport::default());
        let mut ledger = ledger(1).with_transport(transport.clone());

        let block = ledger.mine_pending_transactions("M").unwrap();

        assert_eq!(*transport.broadcast.lock().unwrap(), vec![block.hash]);
    }

    #[test]
    fn test_stale_block_discarded() {
        let mut ledger = ledger(1);
        let mut stale = ledger.block_template();
        stale.mine(1);

        ledger.mine_pending_transactions("M").unwrap();
        let before = ledger.len();

        let result = ledger.commit_mined_block(stale, "M");
        assert!(matches!(result, Err(LedgerError::StaleBlock { .. })));
        assert_eq!(ledger.len(), before);
    }

    #[test]
    fn test_commit_keeps_transactions_queued_during_mining() {
        let mut ledger = ledger(1);
        ledger
            .queue_transaction(Transaction::new("A", "B", 1))
            .unwrap();
        let mut block = ledger.block_template();
        ledger
            .queue_transaction(Transaction::new("C", "D", 2))
            .unwrap();
        block.mine(1);

        ledger.commit_mined_block(block, "M").unwrap();

        let pending = ledger.pending_transactions();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].to, "D");
        assert!(pending[1].is_reward());
    }

    #[test]
    fn test_receive_block_from_peer() {
        let mut local = ledger(1);
        let mut remote = local.clone();

        local
            .queue_transaction(Transaction::new("A", "B", 10))
            .unwrap();
        local
            .queue_transaction(Transaction::new("C", "D", 5))
            .unwrap();
        remote
            .queue_transaction(Transaction::new("A", "B", 10))
            .unwrap();
        let block = remote.mine_pending_transactions("R").unwrap();

        assert!(local.receive_block(block.clone(), "remote"));
        assert_eq!(local.len(), 2);
        assert_eq!(local.latest_block(), &block);
        // A->B was mined remotely; only C->D stays pending.
        assert_eq!(local.pending_transactions().len(), 1);
        assert_eq!(local.pending_transactions()[0].to, "D");
    }

    #[test]
    fn test_receive_block_rejects_bad_link() {
        let mut local = ledger(1);
        let mut block = Block::next(Vec::new(), "f".repeat(64));
        block.mine(1);

        assert!(!local.receive_block(block, "peer"));
        assert_eq!(local.len(), 1);
    }

    #[test]
    fn test_receive_block_rejects_insufficient_work() {
        let mut local = ledger(3);
        let mut block = local.block_template();
        while block.meets_difficulty(3) {
            block.nonce += 1;
            block.hash = block.calculate_hash();
        }

        assert!(!local.receive_block(block, "peer"));
        assert_eq!(local.len(), 1);
    }

    #[test]
    fn test_receive_block_rejects_forged_hash() {
        let mut local = ledger(1);
        let mut block = local.block_template();
        block.mine(1);
        block.transactions.push(Transaction::reward("thief", 1_000));

        assert!(!local.receive_block(block, "peer"));
        assert!(local.is_valid());
    }

    #[test]
    fn test_json_round_trip() {
        let mut ledger = ledger(1);
        ledger
            .queue_transaction(Transaction::new("A", "B", 10))
            .unwrap();
        ledger.mine_pending_transactions("M").unwrap();

        let json = serde_json::to_string(&ledger).unwrap();
        let restored: Ledger = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.chain(), ledger.chain());
        assert_eq!(restored.pending_transactions(), ledger.pending_transactions());
        assert_eq!(restored.config(), ledger.config());
        assert!(restored.is_valid());
    }

    #[test]
    fn test_empty_chain_refused_on_load() {
        let json = r#"{"config":{"difficulty":1,"mining_reward":5},"chain":[]}"#;
        assert!(serde_json::from_str::<Ledger>(json).is_err());
    }
}
