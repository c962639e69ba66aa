use crate::error::{ProtocolError, TransportError};
use crate::identity::Identity;
use crate::logger::EventSink;
use crate::signaling::envelope::{Envelope, Outbound};
use crate::signaling::transport::{LinkState, RelayTransport};
use log::{debug, info};
use std::sync::Arc;
use tokio::sync::watch;

/// Outbound side of signaling: stamps the username, enforces the identity
/// gate and reports failures instead of returning them.
#[derive(Clone)]
pub struct SignalingChannel {
    transport: Arc<dyn RelayTransport>,
    identity: Identity,
    sink: EventSink,
}

impl SignalingChannel {
    pub fn new(transport: Arc<dyn RelayTransport>, identity: Identity, sink: EventSink) -> Self {
        Self {
            transport,
            identity,
            sink,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn link_state(&self) -> watch::Receiver<LinkState> {
        self.transport.link_state()
    }

    /// Binds (or rebinds) the display name and announces it with `store_user`.
    pub async fn bind_username(&self, username: &str) -> bool {
        info!("Binding username {username}");
        self.identity.bind(username);
        self.send(Outbound::StoreUser).await
    }

    /// Fire and forget. Returns whether the frame reached the transport.
    pub async fn send(&self, body: Outbound) -> bool {
        let username = self.identity.username();
        if username.is_none() && body != Outbound::StoreUser {
            self.sink.report(ProtocolError::IdentityUnbound(body.tag()));
            return false;
        }

        let frame = match Envelope::new(&body, username.as_deref()).to_json() {
            Ok(frame) => frame,
            Err(e) => {
                self.sink.report(TransportError::Encode(e.to_string()));
                return false;
            }
        };

        match self.transport.send(frame).await {
            Ok(()) => {
                debug!("Sent {} envelope", body.tag());
                true
            }
            Err(e) => {
                self.sink.report(e);
                false
            }
        }
    }
}
