pub mod app;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod identity;
pub mod logger;
pub mod mock;
pub mod negotiation;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod utils;

pub use client::{CallHandle, Client};
pub use config::{CallConfig, GlarePolicy, NegotiationConfig};
pub use error::{CallError, ConfigError, EngineError, MediaError, ProtocolError, TransportError};
pub use event::{CallEvent, Command, EngineEvent, SessionEvent};
pub use negotiation::{NegotiationController, NegotiationState};
pub use peer::media::MediaConstraints;
pub use peer::types::{IceCandidate, MediaSlot, SessionDescription};

/// Runs the `callsig` command line client with the process arguments.
pub fn run() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let code = app::main_with_args(args);
    if code != 0 {
        std::process::exit(code);
    }
}
