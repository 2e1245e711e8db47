pub mod application;
pub mod infrastructure;

pub use application::ConsoleCommand;
pub use infrastructure::{session_outcome, CliError, LogConfig, Result};
