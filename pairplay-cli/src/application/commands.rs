use crate::infrastructure::error::{CliError, Result};
use pairplay_core::GameMessage;
use serde_json::Value;

/// One line typed at the interactive prompt
///
/// Plain text is chat. Lines starting with `/` are commands:
/// `/ready`, `/start`, `/leave`, `/rematch`, `/react <id>`,
/// `/name <display name>`, `/send <TYPE> [json object]`, `/status`, `/quit`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Chat(String),
    Ready,
    Start,
    Leave,
    Rematch,
    React(String),
    Rename(String),
    Send(GameMessage),
    Status,
    Quit,
}

impl ConsoleCommand {
    /// `Ok(None)` for blank lines
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let Some(command) = line.strip_prefix('/') else {
            return Ok(Some(ConsoleCommand::Chat(line.to_string())));
        };

        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };

        let parsed = match name {
            "ready" => ConsoleCommand::Ready,
            "start" => ConsoleCommand::Start,
            "leave" => ConsoleCommand::Leave,
            "rematch" => ConsoleCommand::Rematch,
            "status" => ConsoleCommand::Status,
            "quit" | "exit" => ConsoleCommand::Quit,
            "react" => ConsoleCommand::React(required(name, rest)?.to_string()),
            "name" => ConsoleCommand::Rename(required(name, rest)?.to_string()),
            "send" => ConsoleCommand::Send(parse_message(required(name, rest)?)?),
            other => return Err(CliError::InvalidCommand(format!("unknown command /{}", other))),
        };

        Ok(Some(parsed))
    }
}

fn required<'a>(command: &str, argument: &'a str) -> Result<&'a str> {
    if argument.is_empty() {
        Err(CliError::InvalidCommand(format!("/{} needs an argument", command)))
    } else {
        Ok(argument)
    }
}

/// `<TYPE> [json object]`
fn parse_message(argument: &str) -> Result<GameMessage> {
    let (kind, body) = match argument.split_once(char::is_whitespace) {
        Some((kind, body)) => (kind, body.trim()),
        None => (argument, ""),
    };

    if body.is_empty() {
        return Ok(GameMessage::new(kind));
    }

    match serde_json::from_str::<Value>(body)? {
        Value::Object(fields) => Ok(fields
            .into_iter()
            .fold(GameMessage::new(kind), |message, (key, value)| {
                message.with_field(key, value)
            })),
        _ => Err(CliError::InvalidCommand(
            "message body must be a JSON object".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_chat() {
        assert_eq!(
            ConsoleCommand::parse("  good game  ").unwrap(),
            Some(ConsoleCommand::Chat("good game".to_string()))
        );
        assert_eq!(ConsoleCommand::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(
            ConsoleCommand::parse("/ready").unwrap(),
            Some(ConsoleCommand::Ready)
        );
        assert_eq!(
            ConsoleCommand::parse("/exit").unwrap(),
            Some(ConsoleCommand::Quit)
        );
        assert_eq!(
            ConsoleCommand::parse("/name  Ada Lovelace").unwrap(),
            Some(ConsoleCommand::Rename("Ada Lovelace".to_string()))
        );
    }

    #[test]
    fn test_send_with_payload() {
        let parsed = ConsoleCommand::parse(r#"/send GAME_INIT {"seed": 42}"#)
            .unwrap()
            .unwrap();

        let ConsoleCommand::Send(message) = parsed else {
            panic!("expected a send command");
        };
        assert_eq!(message.kind(), "GAME_INIT");
        assert_eq!(message.get_i64("seed"), Some(42));
    }

    #[test]
    fn test_send_rejects_non_object() {
        assert!(ConsoleCommand::parse("/send MOVE [1, 2]").is_err());
        assert!(ConsoleCommand::parse("/send MOVE {oops").is_err());
    }

    #[test]
    fn test_missing_argument_and_unknown_command() {
        assert!(ConsoleCommand::parse("/react").is_err());
        assert!(ConsoleCommand::parse("/teleport").is_err());
    }
}
