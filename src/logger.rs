use crate::error::CallError;
use crate::event::CallEvent;
use crate::peer::types::IceCandidate;
use log::{debug, warn, LevelFilter};
use std::io::Write;
use tokio::sync::mpsc;

/// Installs the timestamped logger. Safe to call more than once.
pub fn init(level: &str) {
    let filter = if logging_enabled() {
        level.parse().unwrap_or(LevelFilter::Info)
    } else {
        LevelFilter::Off
    };

    let _ = env_logger::Builder::new()
        .filter_level(filter)
        .parse_default_env()
        .format(|buf, record| {
            let now = chrono::Local::now();
            writeln!(
                buf,
                "[{}] {:<5} {}: {}",
                now.format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init();
}

fn logging_enabled() -> bool {
    #[cfg(debug_assertions)]
    {
        if !crate::config::dev::ENABLE_LOGGING {
            return false;
        }
    }
    crate::config::LOGGING_ENABLED
}

/// Log a trickled ICE candidate
pub fn dump_candidate(label: &str, cand: &IceCandidate) {
    debug!(
        "Trickle {label}: candidate={} sdp_mid={:?} sdp_mline_index={:?} username_fragment={:?}",
        cand.candidate, cand.sdp_mid, cand.sdp_mline_index, cand.username_fragment
    );
}

/// Delivers [`CallEvent`]s to the UI and doubles as the error sink
#[derive(Clone, Debug)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<CallEvent>,
}

impl EventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CallEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: CallEvent) {
        debug!("emit {:?}", event);
        // A UI that stopped listening is not an error for the call.
        let _ = self.tx.send(event);
    }

    pub fn report(&self, err: impl Into<CallError>) {
        let err = err.into();
        warn!("{} error: {}", err.kind(), err);
        self.emit(CallEvent::Error(err));
    }
}
