//! Transport abstraction between the ledger and its peers
//!
//! The ledger never talks to the network directly. It is handed a
//! [`PeerTransport`] and calls out through it; inbound traffic reaches the
//! ledger through [`crate::network::Node`].

use crate::core::Block;
use futures::future::BoxFuture;
use std::fmt;
use thiserror::Error;

/// Errors that can occur during transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("peer not found: {0}")]
    PeerNotFound(String),

    #[error("failed to send message to {0}")]
    SendFailed(String),

    #[error("no reply from {0}")]
    NoReply(String),

    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("message encoding error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Outbound capability used by the ledger.
pub trait PeerTransport: Send + Sync + fmt::Debug {
    /// Announce a block to every known peer. Fire-and-forget: delivery
    /// failures are logged by the transport, never reported back.
    fn broadcast_block(&self, block: &Block);

    /// Gather each reachable peer's full chain as a consensus candidate.
    fn fetch_peer_chains(&self) -> BoxFuture<'_, Vec<Vec<Block>>>;

    /// Identifiers of the peers this transport currently knows about.
    fn known_peers(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Transport for a node with no peers
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl PeerTransport for NullTransport {
    fn broadcast_block(&self, block: &Block) {
        log::debug!("No peers to broadcast block {} to", block.hash);
    }

    fn fetch_peer_chains(&self) -> BoxFuture<'_, Vec<Vec<Block>>> {
        Box::pin(async { Vec::new() })
    }
}
