use pairplay_core::IdentityError;

/// Failures reported by a transport adapter
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Identity already in use: {0}")]
    IdentityTaken(String),

    #[error("Peer unavailable: {0}")]
    PeerUnavailable(String),

    #[error("Transport is not open")]
    NotOpen,

    #[error("No open connection to {0}")]
    NotConnected(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Lost connection to the signalling server")]
    Disconnected,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Message stream broken, {0} messages waiting for a gap that cannot fill")]
    ReorderOverflow(usize),
}

impl TransportError {
    /// Short machine-readable kind, stable across adapters
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::IdentityTaken(_) => "unavailable-id",
            TransportError::PeerUnavailable(_) => "peer-unavailable",
            TransportError::NotOpen => "not-open",
            TransportError::NotConnected(_) => "not-connected",
            TransportError::Network(_) => "network",
            TransportError::Disconnected => "disconnected",
            TransportError::Serialization(_) => "serialization",
            TransportError::ChannelClosed => "channel-closed",
            TransportError::ReorderOverflow(_) => "reorder-overflow",
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Serialization(e.to_string())
    }
}

/// Microphone acquisition failures
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Microphone is in use by another application")]
    DeviceBusy,

    #[error("No microphone found")]
    NotFound,

    #[error("Media error: {0}")]
    Other(String),
}

impl MediaError {
    pub fn kind(&self) -> &'static str {
        match self {
            MediaError::PermissionDenied => "permission-denied",
            MediaError::DeviceBusy => "device-busy",
            MediaError::NotFound => "not-found",
            MediaError::Other(_) => "other",
        }
    }
}

/// Session failure observable through `SessionManager::last_error`
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid session code: {0}")]
    Identity(#[from] IdentityError),

    #[error("Cannot join a session hosted under the own identity")]
    SelfJoin,
}

impl SessionError {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Transport(e) => e.kind(),
            SessionError::Identity(_) => "invalid-id",
            SessionError::SelfJoin => "self-join",
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
