pub mod channel;
pub mod envelope;
pub mod transport;
pub mod ws;

pub use channel::SignalingChannel;
pub use envelope::{Inbound, InboundEnvelope, Outbound};
pub use transport::{LinkState, RelayTransport};
pub use ws::WsTransport;
