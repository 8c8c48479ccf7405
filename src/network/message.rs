//! Network message types exchanged between peers

use crate::core::Block;
use serde::{Deserialize, Serialize};

/// Network message types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Announce a newly mined block
    NewBlock { block: Block, sender: String },

    /// Request the peer's full chain
    GetChain,

    /// Response with a full chain, genesis first
    Chain(Vec<Block>),
}

impl Message {
    /// Serialize message to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize message from bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// Get message type name for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::NewBlock { .. } => "NewBlock",
            Message::GetChain => "GetChain",
            Message::Chain(_) => "Chain",
        }
    }
}
