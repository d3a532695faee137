use beacon_core::IceServerConfig;
use serde::Deserialize;

/// Configuration for the WebRTC-backed peer sessions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig {
                urls: vec!["stun:stun.l.google.com:19302".to_owned()],
                username: None,
                credential: None,
            }],
        }
    }
}
