//! Domain types for two-player peer sessions: identities, roster, session
//! state machine, message envelope and media handles. No networking.

pub mod domain;

pub use domain::{
    reserved, AudioTrack, GameMessage, IdentityError, MediaStream, PeerIdentity, PlayerInfo,
    PlayerStatus, Role, Roster, RosterEntry, SessionMode, SessionState, TransitionError,
    MAX_DISPLAY_NAME_LEN, VOICE_SUFFIX,
};
