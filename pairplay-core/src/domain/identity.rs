use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Suffix appended to a data identity to address its voice endpoint
pub const VOICE_SUFFIX: &str = "-voice";

/// Longest identity accepted by signalling providers
pub const MAX_IDENTITY_LEN: usize = 64;

/// Errors produced when parsing a peer identity
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Identity cannot be empty")]
    Empty,

    #[error("Identity must be at most {max} characters (got {len})")]
    TooLong { len: usize, max: usize },

    #[error("Identity contains invalid character '{0}'")]
    InvalidCharacter(char),

    #[error("Identity must start and end with a letter or digit")]
    InvalidBoundary,
}

/// Domain entity: address used to reach a client directly
///
/// The same identity addresses the data connection; the voice endpoint is
/// reached through [`PeerIdentity::voice_identity`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerIdentity(String);

impl PeerIdentity {
    /// Generate a fresh identity of the form `<prefix>-<8 hex chars>`
    pub fn generate(prefix: &str) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        let short = &suffix[..8];

        match Self::parse(&format!("{}-{}", prefix, short)) {
            Ok(id) => id,
            // Unusable prefix: fall back to the bare random part
            Err(_) => Self(short.to_string()),
        }
    }

    /// Parse an identity typed or pasted by a user (surrounding whitespace is ignored)
    pub fn parse(s: &str) -> Result<Self, IdentityError> {
        let s = s.trim();

        if s.is_empty() {
            return Err(IdentityError::Empty);
        }

        let len = s.chars().count();
        if len > MAX_IDENTITY_LEN {
            return Err(IdentityError::TooLong {
                len,
                max: MAX_IDENTITY_LEN,
            });
        }

        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(IdentityError::InvalidCharacter(c));
        }

        let is_edge = |c: Option<char>| matches!(c, Some('-') | Some('_'));
        if is_edge(s.chars().next()) || is_edge(s.chars().last()) {
            return Err(IdentityError::InvalidBoundary);
        }

        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identity of the voice endpoint paired with this data identity
    pub fn voice_identity(&self) -> PeerIdentity {
        PeerIdentity(format!("{}{}", self.0, VOICE_SUFFIX))
    }

    /// Whether this identity addresses a voice endpoint
    pub fn is_voice_identity(&self) -> bool {
        self.0.ends_with(VOICE_SUFFIX)
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for PeerIdentity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PeerIdentity> for String {
    fn from(id: PeerIdentity) -> Self {
        id.0
    }
}

impl std::str::FromStr for PeerIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
