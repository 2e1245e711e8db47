use crate::domain::IceServer;
use serde::{Deserialize, Serialize};

/// Configuration for a peer session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Matchbox signalling server URL (rooms are appended as a path segment)
    pub signalling_server: String,

    /// ICE servers for NAT traversal
    pub ice_servers: Vec<IceServer>,

    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,

    /// Give up dialing a host that does not answer within this many milliseconds
    pub connect_timeout_ms: u64,

    /// Prefix of generated identities
    pub identity_prefix: String,

    /// Host starts the match as soon as the guest reports ready
    pub auto_start: bool,

    /// Out-of-order game messages held per connection
    pub max_pending_messages: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            signalling_server: "ws://localhost:3536".to_string(),
            ice_servers: IceServer::default_stun_servers(),
            poll_interval_ms: 100,
            connect_timeout_ms: 15_000,
            identity_prefix: "pp".to_string(),
            auto_start: true,
            max_pending_messages: 256,
        }
    }
}

impl SessionConfig {
    pub fn new(signalling_server: impl Into<String>) -> Self {
        Self {
            signalling_server: signalling_server.into(),
            ..Default::default()
        }
    }

    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_connect_timeout(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    pub fn with_ice_servers(mut self, ice_servers: Vec<IceServer>) -> Self {
        self.ice_servers = ice_servers;
        self
    }

    /// Add a TURN relay next to the configured servers
    pub fn with_turn_server(
        mut self,
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        self.ice_servers
            .push(IceServer::turn(url, username, credential));
        self
    }

    pub fn with_identity_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.identity_prefix = prefix.into();
        self
    }

    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    pub fn with_max_pending_messages(mut self, max: usize) -> Self {
        self.max_pending_messages = max;
        self
    }
}

/// Configuration for the voice channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Local tracks start disabled after the microphone is granted
    pub start_muted: bool,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self { start_muted: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();

        assert_eq!(config.poll_interval_ms, 100);
        assert!(config.auto_start);
        assert_eq!(config.identity_prefix, "pp");
        assert!(!config.ice_servers.is_empty());
        assert!(VoiceConfig::default().start_muted);
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::new("wss://signal.example.com")
            .with_poll_interval(50)
            .with_turn_server("turn:turn.example.com:3478", "user", "pass")
            .with_identity_prefix("memory")
            .with_auto_start(false)
            .with_max_pending_messages(16);

        assert_eq!(config.signalling_server, "wss://signal.example.com");
        assert_eq!(config.poll_interval_ms, 50);
        assert!(config.ice_servers.iter().any(IceServer::is_turn));
        assert_eq!(config.identity_prefix, "memory");
        assert!(!config.auto_start);
        assert_eq!(config.max_pending_messages, 16);
    }

    #[test]
    fn test_partial_deserialization() {
        let config: SessionConfig = serde_json::from_str(
            r#"{ "signalling_server": "wss://signal.example.com", "auto_start": false }"#,
        )
        .unwrap();

        assert_eq!(config.signalling_server, "wss://signal.example.com");
        assert!(!config.auto_start);
        assert_eq!(config.max_pending_messages, 256);
    }
}
