use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Message types with a shared meaning across all games
pub mod reserved {
    pub const CHAT: &str = "CHAT";
    pub const REACTION: &str = "REACTION";
    pub const LEAVE_GAME: &str = "LEAVE_GAME";
    pub const REMATCH_START: &str = "REMATCH_START";

    pub const ALL: [&str; 4] = [CHAT, REACTION, LEAVE_GAME, REMATCH_START];
}

/// A typed message exchanged between the two peers
///
/// Serialized flat: `{ "type": "GAME_INIT", "seed": 42 }`. The `type` key is
/// owned by the envelope and never appears in the payload map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameMessage {
    #[serde(rename = "type")]
    kind: String,

    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl GameMessage {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Map::new(),
        }
    }

    /// Add a payload field (a `type` key is ignored)
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key != "type" {
            self.payload.insert(key, value.into());
        }
        self
    }

    /// Build a message from any serializable payload struct
    pub fn with_payload<T: Serialize>(
        kind: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        let mut message = Self::new(kind);
        if let Value::Object(map) = serde_json::to_value(payload)? {
            for (key, value) in map {
                message = message.with_field(key, value);
            }
        }
        Ok(message)
    }

    pub fn chat(text: impl Into<String>, sender_name: impl Into<String>) -> Self {
        Self::new(reserved::CHAT)
            .with_field("text", text.into())
            .with_field("senderName", sender_name.into())
    }

    pub fn reaction(id: impl Into<Value>) -> Self {
        Self::new(reserved::REACTION).with_field("id", id)
    }

    pub fn leave_game() -> Self {
        Self::new(reserved::LEAVE_GAME)
    }

    pub fn rematch_start() -> Self {
        Self::new(reserved::REMATCH_START)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }

    pub fn is_reserved(&self) -> bool {
        reserved::ALL.contains(&self.kind.as_str())
    }

    /// Whether the type follows the UPPER_SNAKE_CASE convention
    pub fn has_conventional_type(&self) -> bool {
        let mut chars = self.kind.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
            && self
                .kind
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
            && !self.kind.ends_with('_')
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.payload.get(key).and_then(Value::as_i64)
    }

    /// Decode the payload into a game-specific struct
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.payload.clone()))
    }
}
