pub mod connection;
pub mod error;
pub mod memory;
pub mod message;
pub mod transport;

pub use connection::MatchboxTransport;
pub use memory::{MemoryMedia, MemoryNetwork, MemoryTransport, MicrophoneBehavior, ScriptedDevices};
pub use message::Frame;
pub use transport::{DataTransport, MediaDevices, MediaTransport};
