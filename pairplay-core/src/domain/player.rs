use crate::domain::PeerIdentity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Display names longer than this are truncated
pub const MAX_DISPLAY_NAME_LEN: usize = 50;

/// Name shown for a participant that has not announced one
pub const DEFAULT_DISPLAY_NAME: &str = "Player";

/// Displayed connection status of a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    /// Still establishing the session
    Connecting,
    /// Owns the room and waits for (or plays with) a guest
    Hosting,
    /// Dialed into a host's room
    Joined,
    /// Signalled readiness to start the match
    Ready,
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerStatus::Connecting => write!(f, "connecting"),
            PlayerStatus::Hosting => write!(f, "hosting"),
            PlayerStatus::Joined => write!(f, "joined"),
            PlayerStatus::Ready => write!(f, "ready"),
        }
    }
}

/// Self-info a participant broadcasts about itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub display_name: String,
    pub avatar_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode_label: Option<String>,
}

impl PlayerInfo {
    pub fn new(display_name: impl Into<String>, avatar_ref: impl Into<String>) -> Self {
        Self {
            display_name: normalize_display_name(&display_name.into()),
            avatar_ref: avatar_ref.into(),
            extra: None,
            mode_label: None,
        }
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn with_mode_label(mut self, label: impl Into<String>) -> Self {
        self.mode_label = Some(label.into());
        self
    }

    /// Apply the name rules to info received from the wire
    pub fn normalized(mut self) -> Self {
        self.display_name = normalize_display_name(&self.display_name);
        self
    }
}

impl Default for PlayerInfo {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_NAME, "")
    }
}

/// Trim the name, replace an empty one and cap its length
fn normalize_display_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return DEFAULT_DISPLAY_NAME.to_string();
    }
    trimmed.chars().take(MAX_DISPLAY_NAME_LEN).collect()
}

/// One known participant as displayed in the lobby
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    id: PeerIdentity,
    info: PlayerInfo,
    status: PlayerStatus,
}

impl RosterEntry {
    pub fn new(id: PeerIdentity, info: PlayerInfo, status: PlayerStatus) -> Self {
        Self { id, info, status }
    }

    pub fn id(&self) -> &PeerIdentity {
        &self.id
    }

    pub fn info(&self) -> &PlayerInfo {
        &self.info
    }

    pub fn display_name(&self) -> &str {
        &self.info.display_name
    }

    pub fn avatar_ref(&self) -> &str {
        &self.info.avatar_ref
    }

    pub fn mode_label(&self) -> Option<&str> {
        self.info.mode_label.as_deref()
    }

    pub fn extra(&self) -> Option<&Value> {
        self.info.extra.as_ref()
    }

    pub fn status(&self) -> PlayerStatus {
        self.status
    }

    pub fn set_info(&mut self, info: PlayerInfo) {
        self.info = info;
    }

    pub fn set_status(&mut self, status: PlayerStatus) {
        self.status = status;
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.status, PlayerStatus::Ready)
    }
}
