pub mod connection;
pub mod engine;
pub mod fingerprint;
pub mod ice;
pub mod media;
pub mod types;

pub use connection::{RtcEngine, RtcEngineFactory};
pub use engine::{PeerEngine, PeerEngineFactory};
pub use media::{LocalTrack, MediaConstraints, MediaSource, SyntheticSource};
pub use types::{IceCandidate, MediaSlot, ServerConfig, SessionDescription, SlotMap};
