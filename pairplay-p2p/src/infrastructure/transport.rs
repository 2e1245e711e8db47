use crate::application::{CallId, DeviceEvent, MediaEvent, MicrophoneTicket, TransportEvent};
use crate::infrastructure::error::Result;
use pairplay_core::{MediaStream, PeerIdentity};

/// Data side of a P2P connection provider (allows mocking in tests)
///
/// Operations only start work; outcomes arrive through `poll_events`.
/// Returned errors cover misuse detected synchronously, such as sending
/// without an open connection.
pub trait DataTransport {
    /// Register the local identity; answers with `Open` or `Error`
    fn open(&mut self, local: &PeerIdentity) -> Result<()>;

    /// Dial a remote identity; answers with `ConnectionOpened` or `Error`
    fn connect(&mut self, remote: &PeerIdentity) -> Result<()>;

    fn send(&mut self, remote: &PeerIdentity, payload: Vec<u8>) -> Result<()>;

    /// Close one data connection; the peer observes `ConnectionClosed`
    fn close_connection(&mut self, remote: &PeerIdentity);

    /// Close every connection and unregister the identity
    fn close(&mut self);

    fn poll_events(&mut self) -> Vec<TransportEvent>;
}

/// Media side of a P2P connection provider
pub trait MediaTransport {
    fn open(&mut self, local: &PeerIdentity) -> Result<()>;

    fn call(&mut self, remote: &PeerIdentity, stream: Option<MediaStream>) -> Result<CallId>;

    fn answer(&mut self, call: CallId, stream: Option<MediaStream>) -> Result<()>;

    fn hang_up(&mut self, call: CallId);

    fn close(&mut self);

    fn poll_events(&mut self) -> Vec<MediaEvent>;
}

/// Access to capture devices
pub trait MediaDevices {
    /// Ask for a microphone stream; answers with `Granted` or `Failed`
    fn request_microphone(&mut self, ticket: MicrophoneTicket);

    fn poll_events(&mut self) -> Vec<DeviceEvent>;
}
