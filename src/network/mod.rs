//! Peer networking module
//!
//! The ledger reaches its peers only through the [`PeerTransport`]
//! capability. [`Node`] is the inbound side: it feeds received blocks and
//! chains into the ledger and runs mining alongside them.
//!
//! # Features
//! - Transport abstraction with a no-op default
//! - In-process transport for tests and demos
//! - Block gossip and full-chain fetches
//! - Cancellable background mining

pub mod local;
pub mod message;
pub mod node;
pub mod transport;

pub use local::{Frame, LocalNetwork, LocalTransport, REQUEST_TIMEOUT};
pub use message::Message;
pub use node::{Node, NodeError};
pub use transport::{NullTransport, PeerTransport, TransportError};
