//! In-memory transport for tests, demos and single-process simulations.
//!
//! Peers join a shared [`LocalNetwork`] and exchange JSON-encoded
//! [`Message`] frames over tokio channels. Requests carry a oneshot reply
//! channel.

use crate::core::Block;
use crate::network::message::Message;
use crate::network::transport::{PeerTransport, TransportError};
use futures::future::{join_all, BoxFuture};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// How long a request waits for its reply
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A serialized message in flight between two peers
#[derive(Debug)]
pub struct Frame {
    pub from: String,
    pub payload: Vec<u8>,
    pub reply: Option<oneshot::Sender<Vec<u8>>>,
}

/// Registry of the peers sharing one process
#[derive(Debug, Clone, Default)]
pub struct LocalNetwork {
    peers: Arc<RwLock<HashMap<String, mpsc::UnboundedSender<Frame>>>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` and return its transport and inbox
    pub fn join(&self, id: &str) -> (Arc<LocalTransport>, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), tx);

        let transport = Arc::new(LocalTransport {
            id: id.to_string(),
            network: self.clone(),
        });
        (transport, rx)
    }

    /// Remove `id`; its inbox closes once pending frames drain
    pub fn leave(&self, id: &str) {
        self.peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    pub fn peer_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    fn sender(&self, id: &str) -> Option<mpsc::UnboundedSender<Frame>> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }
}

/// One peer's handle on a [`LocalNetwork`]
#[derive(Debug)]
pub struct LocalTransport {
    id: String,
    network: LocalNetwork,
}

impl LocalTransport {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Send a message without waiting for a reply
    pub fn send_message(&self, to: &str, message: &Message) -> Result<(), TransportError> {
        self.deliver(to, message.to_bytes()?, None)
    }

    /// Send a message and wait for the peer's reply
    pub async fn request(&self, to: &str, message: &Message) -> Result<Message, TransportError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.deliver(to, message.to_bytes()?, Some(reply_tx))?;

        match tokio::time::timeout(REQUEST_TIMEOUT, reply_rx).await {
            Ok(Ok(bytes)) => Ok(Message::from_bytes(&bytes)?),
            Ok(Err(_)) => Err(TransportError::NoReply(to.to_string())),
            Err(_) => Err(TransportError::Timeout(to.to_string())),
        }
    }

    fn deliver(
        &self,
        to: &str,
        payload: Vec<u8>,
        reply: Option<oneshot::Sender<Vec<u8>>>,
    ) -> Result<(), TransportError> {
        let peer = self
            .network
            .sender(to)
            .ok_or_else(|| TransportError::PeerNotFound(to.to_string()))?;

        peer.send(Frame {
            from: self.id.clone(),
            payload,
            reply,
        })
        .map_err(|_| TransportError::SendFailed(to.to_string()))
    }
}

impl PeerTransport for LocalTransport {
    fn broadcast_block(&self, block: &Block) {
        let message = Message::NewBlock {
            block: block.clone(),
            sender: self.id.clone(),
        };
        let payload = match message.to_bytes() {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("Failed to encode block {}: {}", block.hash, e);
                return;
            }
        };

        for peer in self.known_peers() {
            log::debug!("Sending block {} to {}", block.hash, peer);
            if let Err(e) = self.deliver(&peer, payload.clone(), None) {
                log::warn!("Failed to broadcast block to {}: {}", peer, e);
            }
        }
    }

    fn fetch_peer_chains(&self) -> BoxFuture<'_, Vec<Vec<Block>>> {
        Box::pin(async move {
            let peers = self.known_peers();
            let get_chain = Message::GetChain;
            let requests = peers.iter().map(|peer| self.request(peer, &get_chain));
            let replies = join_all(requests).await;

            let mut chains = Vec::new();
            for (peer, reply) in peers.iter().zip(replies) {
                match reply {
                    Ok(Message::Chain(chain)) => chains.push(chain),
                    Ok(other) => log::warn!(
                        "Unexpected {} from {} in reply to GetChain",
                        other.type_name(),
                        peer
                    ),
                    Err(e) => log::warn!("Failed to fetch chain from {}: {}", peer, e),
                }
            }

            chains
        })
    }

    fn known_peers(&self) -> Vec<String> {
        self.network
            .peer_ids()
            .into_iter()
            .filter(|id| *id != self.id)
            .collect()
    }
}
