#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid session code: {0}")]
    InvalidSessionCode(#[from] pairplay_core::IdentityError),

    #[error("Session failed: {0}")]
    Session(#[from] pairplay_p2p::SessionError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Exit result of a finished session: an error when it ended on a failure
pub fn session_outcome(last_error: Option<&pairplay_p2p::SessionError>) -> Result<()> {
    match last_error {
        Some(e) => Err(CliError::Session(e.clone())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairplay_p2p::{SessionError, TransportError};

    #[test]
    fn test_clean_end_is_ok() {
        assert!(session_outcome(None).is_ok());
    }

    #[test]
    fn test_failed_end_is_session_error() {
        let failure = SessionError::from(TransportError::Disconnected);
        let err = session_outcome(Some(&failure)).unwrap_err();

        assert!(matches!(err, CliError::Session(SessionError::Transport(_))));
        assert_eq!(
            err.to_string(),
            "Session failed: Transport failure: Lost connection to the signalling server"
        );
    }
}
