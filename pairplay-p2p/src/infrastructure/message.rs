use crate::infrastructure::error::Result;
use pairplay_core::{GameMessage, PlayerInfo, PlayerStatus};
use serde::{Deserialize, Serialize};

/// Envelope for everything sent over the data channel
///
/// Control frames drive the lobby; game traffic rides in `App` frames with a
/// per-connection sequence number starting at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frame {
    /// Sender's current self-info and status
    SelfInfo {
        info: PlayerInfo,
        status: PlayerStatus,
    },

    /// Sender is ready to start
    Ready,

    /// Host starts the match
    StartGame,

    /// Game message (opaque to the session)
    App { seq: u64, message: GameMessage },
}

impl Frame {
    pub fn app(seq: u64, message: GameMessage) -> Self {
        Frame::App { seq, message }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
