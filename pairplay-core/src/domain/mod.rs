pub mod identity;
pub mod media;
pub mod message;
pub mod player;
pub mod roster;
pub mod session;

pub use identity::{IdentityError, PeerIdentity, VOICE_SUFFIX};
pub use media::{AudioTrack, MediaStream};
pub use message::{reserved, GameMessage};
pub use player::{PlayerInfo, PlayerStatus, RosterEntry, MAX_DISPLAY_NAME_LEN};
pub use roster::Roster;
pub use session::{Role, SessionMode, SessionState, TransitionError};
