mod config;
mod events;
mod match_session;
mod message_bus;
mod session_manager;
mod voice;

pub use config::{SessionConfig, VoiceConfig};
pub use events::{CallId, DeviceEvent, MediaEvent, MicrophoneTicket, TransportEvent};
pub use match_session::MatchSession;
pub use message_bus::{MessageBus, MessageInbox, SubscriptionId};
pub use session_manager::{SessionManager, SessionSnapshot};
pub use voice::{VoiceInputs, VoiceManager, VoiceStatus};
