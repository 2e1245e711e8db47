//! Peer-to-peer session layer for two-player games: data transport over
//! matchbox, session lifecycle, game message bus and the voice channel.

// Domain layer (core)
pub mod domain;

// Application layer (use cases)
pub mod application;

// Infrastructure layer (adapters)
pub mod infrastructure;

// Re-exports for convenience
pub use application::{
    CallId, DeviceEvent, MatchSession, MediaEvent, MessageBus, MessageInbox, MicrophoneTicket,
    SessionConfig, SessionManager, SessionSnapshot, SubscriptionId, TransportEvent, VoiceConfig,
    VoiceInputs, VoiceManager, VoiceStatus,
};
pub use domain::{Arrival, IceServer, InboundSequencer};
pub use infrastructure::error::{MediaError, Result, SessionError, TransportError};
pub use infrastructure::{
    DataTransport, Frame, MatchboxTransport, MediaDevices, MediaTransport, MemoryMedia,
    MemoryNetwork, MemoryTransport, MicrophoneBehavior, ScriptedDevices,
};
pub use pairplay_core::{
    reserved, GameMessage, MediaStream, PeerIdentity, PlayerInfo, PlayerStatus, Role,
    SessionMode,
};
