use crate::domain::PeerIdentity;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Which side of the connection this client plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Created the room; authoritative for shared randomness (P1)
    Host,
    /// Dialed into the host's room (P2)
    Guest,
}

/// Session lifecycle mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    #[default]
    Idle,
    Connecting,
    Lobby,
    InGame,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Idle => write!(f, "idle"),
            SessionMode::Connecting => write!(f, "connecting"),
            SessionMode::Lobby => write!(f, "lobby"),
            SessionMode::InGame => write!(f, "in_game"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Cannot move from {from} to {to}")]
    Invalid { from: SessionMode, to: SessionMode },

    #[error("No remote participant attached")]
    NoRemote,

    #[error("Remote already attached: {0}")]
    RemoteAlreadyAttached(PeerIdentity),
}

/// Session state machine
///
/// `idle -> connecting -> lobby -> in_game`, with `reset` reachable from any
/// mode. `in_game` requires a remote identity; losing the remote while in game
/// falls back to `lobby`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    role: Option<Role>,
    mode: SessionMode,
    local: PeerIdentity,
    remote: Option<PeerIdentity>,
}

impl SessionState {
    pub fn new(local: PeerIdentity) -> Self {
        Self {
            role: None,
            mode: SessionMode::Idle,
            local,
            remote: None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn local(&self) -> &PeerIdentity {
        &self.local
    }

    pub fn remote(&self) -> Option<&PeerIdentity> {
        self.remote.as_ref()
    }

    pub fn is_host(&self) -> bool {
        self.role == Some(Role::Host)
    }

    pub fn is_active(&self) -> bool {
        self.mode != SessionMode::Idle
    }

    /// Start a connection attempt with a fixed role
    pub fn begin_connecting(&mut self, role: Role) -> Result<(), TransitionError> {
        self.expect_mode(&[SessionMode::Idle], SessionMode::Connecting)?;
        self.role = Some(role);
        self.set_mode(SessionMode::Connecting);
        Ok(())
    }

    pub fn enter_lobby(&mut self) -> Result<(), TransitionError> {
        self.expect_mode(
            &[SessionMode::Connecting, SessionMode::InGame],
            SessionMode::Lobby,
        )?;
        self.set_mode(SessionMode::Lobby);
        Ok(())
    }

    pub fn attach_remote(&mut self, remote: PeerIdentity) -> Result<(), TransitionError> {
        match &self.remote {
            Some(existing) if existing != &remote => {
                Err(TransitionError::RemoteAlreadyAttached(existing.clone()))
            }
            _ => {
                self.remote = Some(remote);
                Ok(())
            }
        }
    }

    /// Forget the remote; an active match falls back to the lobby
    pub fn detach_remote(&mut self) -> Option<PeerIdentity> {
        let removed = self.remote.take();
        if removed.is_some() && self.mode == SessionMode::InGame {
            self.set_mode(SessionMode::Lobby);
        }
        removed
    }

    pub fn enter_game(&mut self) -> Result<(), TransitionError> {
        self.expect_mode(&[SessionMode::Lobby], SessionMode::InGame)?;
        if self.remote.is_none() {
            return Err(TransitionError::NoRemote);
        }
        self.set_mode(SessionMode::InGame);
        Ok(())
    }

    /// Back to idle, keeping the local identity
    pub fn reset(&mut self) {
        self.role = None;
        self.remote = None;
        self.set_mode(SessionMode::Idle);
    }

    /// Back to idle under a new local identity
    pub fn reset_with_identity(&mut self, local: PeerIdentity) {
        self.reset();
        self.local = local;
    }

    fn expect_mode(&self, allowed: &[SessionMode], to: SessionMode) -> Result<(), TransitionError> {
        if allowed.contains(&self.mode) {
            Ok(())
        } else {
            Err(TransitionError::Invalid {
                from: self.mode,
                to,
            })
        }
    }

    fn set_mode(&mut self, mode: SessionMode) {
        if self.mode != mode {
            debug!(local = %self.local, from = %self.mode, to = %mode, "Session mode changed");
            self.mode = mode;
        }
    }
}
