// Runtime configuration.
// Logging can be switched off completely only in development builds.

use crate::error::ConfigError;
use crate::peer::types::ServerConfig;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const LOGGING_ENABLED: bool = true;

#[cfg(debug_assertions)]
pub mod dev {
    // Set to false to silence every log line in a debug build.
    // Has no effect in release builds.
    pub const ENABLE_LOGGING: bool = true;
}

pub const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:3000";

pub static DEFAULT_ICE_SERVERS: Lazy<Vec<ServerConfig>> = Lazy::new(|| {
    [
        "stun:stun.l.google.com:19302",
        "stun:stun1.l.google.com:19302",
        "stun:stun2.l.google.com:19302",
        "stun:stun3.l.google.com:19302",
    ]
    .iter()
    .enumerate()
    .map(|(i, url)| ServerConfig {
        id: format!("default-stun-{i}"),
        r#type: "stun".into(),
        url: (*url).into(),
        username: None,
        credential: None,
    })
    .collect()
});

/// How to resolve an inbound offer that collides with our outstanding one
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GlarePolicy {
    /// Roll back our offer and answer theirs
    #[default]
    LastWriterWins,
    /// Higher username keeps its offer, lower one yields
    Deterministic,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct NegotiationConfig {
    pub glare: GlarePolicy,
    /// Unset means an offer waits for its answer indefinitely
    pub answer_timeout_secs: Option<u64>,
}

impl NegotiationConfig {
    pub fn answer_timeout(&self) -> Option<Duration> {
        self.answer_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CallConfig {
    pub relay_url: String,
    pub username: Option<String>,
    pub audio_device: Option<String>,
    pub video_device: Option<String>,
    pub ice_servers: Vec<ServerConfig>,
    pub negotiation: NegotiationConfig,
    pub log_level: String,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.into(),
            username: None,
            audio_device: None,
            video_device: None,
            ice_servers: DEFAULT_ICE_SERVERS.clone(),
            negotiation: NegotiationConfig::default(),
            log_level: "info".into(),
        }
    }
}

impl CallConfig {
    /// Reads a TOML file; missing keys fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: CallConfig =
            toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_ice_servers(&self.ice_servers)
    }
}

/// Rejects empty URLs and TURN entries without credentials.
pub fn validate_ice_servers(servers: &[ServerConfig]) -> Result<(), ConfigError> {
    for server in servers {
        if server.url.is_empty() {
            return Err(ConfigError::IceServer {
                id: server.id.clone(),
                reason: "server URL cannot be empty".into(),
            });
        }

        if server.r#type == "turn" && (server.username.is_none() || server.credential.is_none()) {
            return Err(ConfigError::IceServer {
                id: server.id.clone(),
                reason: "TURN servers require username and credential".into(),
            });
        }
    }
    Ok(())
}
