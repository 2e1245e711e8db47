mod commands;

pub use commands::ConsoleCommand;
