pub mod error;
pub mod observability;

pub use error::{session_outcome, CliError, Result};
pub use observability::LogConfig;
