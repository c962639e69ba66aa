//! Relay transport abstraction
//!
//! A duplex channel of text frames to the signaling relay. Implemented by the
//! WebSocket transport and by the in-memory mock used in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

pub use crate::error::TransportError;

/// Connection state of the relay link
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Connecting,
    Open,
    Closed,
}

#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Queue one frame for the relay
    async fn send(&self, frame: String) -> Result<(), TransportError>;

    /// Next frame from the relay in arrival order; `None` once the link is gone
    async fn recv(&self) -> Option<String>;

    /// Observable link state
    fn link_state(&self) -> watch::Receiver<LinkState>;

    async fn close(&self);
}
