//! Ledger node
//!
//! Wraps a ledger for concurrent use. Mining runs on a blocking worker
//! while the ledger stays available for inbound blocks and chains; every
//! mutation goes through the single write lock, so an append always sees
//! the tip it is checked against.

use crate::core::{Block, ConsensusResolver, Ledger, LedgerError, Transaction};
use crate::mining::{Miner, MiningStats};
use crate::network::local::Frame;
use crate::network::message::Message;
use crate::network::transport::TransportError;
use crate::storage::{Storage, StorageError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, RwLock};

/// Node errors
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Mining task failed: {0}")]
    MiningTask(#[from] tokio::task::JoinError),
}

/// A ledger shared between the miner and the network
pub struct Node {
    id: String,
    ledger: Arc<RwLock<Ledger>>,
    storage: Option<Storage>,
    /// Raised to abandon every mining job started on the current tip
    cancel: Mutex<Arc<AtomicBool>>,
    active_jobs: AtomicUsize,
}

impl Node {
    pub fn new(id: &str, ledger: Ledger) -> Self {
        Self {
            id: id.to_string(),
            ledger: Arc::new(RwLock::new(ledger)),
            storage: None,
            cancel: Mutex::new(Arc::new(AtomicBool::new(false))),
            active_jobs: AtomicUsize::new(0),
        }
    }

    /// Persist the ledger after every change
    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ledger(&self) -> Arc<RwLock<Ledger>> {
        self.ledger.clone()
    }

    /// Whether a mining job is running
    pub fn is_mining(&self) -> bool {
        self.active_jobs.load(Ordering::SeqCst) > 0
    }

    pub async fn chain_len(&self) -> usize {
        self.ledger.read().await.len()
    }

    /// Copy of the current chain
    pub async fn snapshot(&self) -> Vec<Block> {
        self.ledger.read().await.chain().to_vec()
    }

    pub async fn balance(&self, address: &str) -> Result<i128, NodeError> {
        Ok(self.ledger.read().await.get_balance(address)?)
    }

    pub async fn submit_transaction(&self, tx: Transaction) -> Result<(), NodeError> {
        let mut ledger = self.ledger.write().await;
        ledger.queue_transaction(tx)?;
        self.persist(&ledger);
        Ok(())
    }

    /// Mine the pending pool without holding the ledger lock.
    ///
    /// Returns `Ok(None)` when the job was cancelled or the chain moved on
    /// while it ran; such a block is discarded rather than appended.
    pub async fn mine(&self, reward_address: &str) -> Result<Option<(Block, MiningStats)>, NodeError> {
        // The token must belong to the tip the template is built on.
        let (template, difficulty, cancel) = {
            let ledger = self.ledger.read().await;
            ledger.ensure_valid()?;
            let cancel = self.cancel.lock().await.clone();
            (ledger.block_template(), ledger.difficulty(), cancel)
        };

        let miner = Miner::new(reward_address);
        self.active_jobs.fetch_add(1, Ordering::SeqCst);
        let outcome = tokio::task::spawn_blocking(move || {
            miner.mine_detached(template, difficulty, &cancel)
        })
        .await;
        self.active_jobs.fetch_sub(1, Ordering::SeqCst);

        let Some((block, stats)) = outcome? else {
            return Ok(None);
        };

        let mut ledger = self.ledger.write().await;
        let committed = ledger
            .commit_mined_block(block, reward_address)
            .map(|block| block.clone());

        match committed {
            Ok(block) => {
                self.persist(&ledger);
                Ok(Some((block, stats)))
            }
            Err(LedgerError::StaleBlock { expected, found }) => {
                log::warn!(
                    "Node {} discarding stale block built on {} (tip is now {})",
                    self.id,
                    found,
                    expected
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Abandon in-flight mining jobs.
    ///
    /// Lock order is ledger first, then the cancel token; handlers that
    /// change the tip call this before releasing the write guard.
    pub async fn cancel_mining(&self) {
        let mut cancel = self.cancel.lock().await;
        cancel.store(true, Ordering::SeqCst);
        *cancel = Arc::new(AtomicBool::new(false));
    }

    /// Inbound block from a peer
    pub async fn on_block_received(&self, block: Block, sender: &str) -> bool {
        let mut ledger = self.ledger.write().await;
        let accepted = ledger.receive_block(block, sender);
        if accepted {
            self.persist(&ledger);
            self.cancel_mining().await;
        }
        accepted
    }

    /// Inbound candidate chains
    pub async fn on_chain_received(&self, chains: Vec<Vec<Block>>) -> bool {
        let mut ledger = self.ledger.write().await;
        let adopted = ConsensusResolver::resolve(&mut ledger, chains);
        if adopted {
            self.persist(&ledger);
            self.cancel_mining().await;
        }
        adopted
    }

    /// Pull every peer's chain and adopt the longest valid one
    pub async fn sync_with_peers(&self) -> bool {
        let transport = self.ledger.read().await.transport();
        let chains = transport.fetch_peer_chains().await;
        log::debug!("Node {} fetched {} candidate chain(s)", self.id, chains.len());
        self.on_chain_received(chains).await
    }

    /// Serve inbound frames until the inbox closes
    pub async fn run(self: Arc<Self>, mut inbox: mpsc::UnboundedReceiver<Frame>) {
        while let Some(frame) = inbox.recv().await {
            self.handle_frame(frame).await;
        }
        log::info!("Node {} inbox closed", self.id);
    }

    async fn handle_frame(self: &Arc<Self>, frame: Frame) {
        let message = match Message::from_bytes(&frame.payload) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Node {} dropped malformed frame from {}: {}", self.id, frame.from, e);
                return;
            }
        };
        log::debug!(
            "Node {} received {} from {}",
            self.id,
            message.type_name(),
            frame.from
        );

        match message {
            Message::NewBlock { block, sender } => {
                let unknown_parent = self
                    .ledger
                    .read()
                    .await
                    .get_block_by_hash(&block.previous_hash)
                    .is_none();

                if !self.on_block_received(block, &sender).await && unknown_parent {
                    // The sender is ahead of us or on another branch.
                    let node = Arc::clone(self);
                    tokio::spawn(async move {
                        node.sync_with_peers().await;
                    });
                }
            }
            Message::GetChain => {
                let Some(reply) = frame.reply else {
                    log::debug!("GetChain from {} without reply channel", frame.from);
                    return;
                };
                match Message::Chain(self.snapshot().await).to_bytes() {
                    Ok(bytes) => {
                        if reply.send(bytes).is_err() {
                            log::debug!("{} stopped waiting for our chain", frame.from);
                        }
                    }
                    Err(e) => log::error!("Failed to encode chain: {}", e),
                }
            }
            Message::Chain(chain) => {
                self.on_chain_received(vec![chain]).await;
            }
        }
    }

    fn persist(&self, ledger: &Ledger) {
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.save(ledger) {
                log::error!("Node {} failed to save ledger: {}", self.id, e);
            }
        }
    }
}
