mod ice_server;
mod sequence;

pub use ice_server::IceServer;
pub use sequence::{Arrival, InboundSequencer};
