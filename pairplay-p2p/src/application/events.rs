use crate::infrastructure::error::{MediaError, TransportError};
use pairplay_core::{MediaStream, PeerIdentity};
use std::fmt;

/// Events raised by a data transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Local identity registered with the provider
    Open { local: PeerIdentity },

    /// Provider-level failure (identity taken, peer unavailable, network)
    Error(TransportError),

    /// Data channel to a peer is usable
    ConnectionOpened(PeerIdentity),

    /// Data channel to a peer went away
    ConnectionClosed(PeerIdentity),

    /// Bytes received from a connected peer
    Data { from: PeerIdentity, payload: Vec<u8> },
}

/// Handle for one media call, unique per media transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(pub u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call#{}", self.0)
    }
}

/// Events raised by a media transport
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    Open { local: PeerIdentity },
    IncomingCall { call: CallId, from: PeerIdentity },
    RemoteStream { call: CallId, stream: MediaStream },
    CallClosed { call: CallId },
    Error(TransportError),
}

/// Ties a microphone request to the activation that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MicrophoneTicket(pub u64);

/// Results of microphone requests
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Granted {
        ticket: MicrophoneTicket,
        stream: MediaStream,
    },
    Failed {
        ticket: MicrophoneTicket,
        error: MediaError,
    },
}
