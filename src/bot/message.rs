use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::eval::Value;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ChatKind,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    pub first_name: String,
}

/// An incoming chat message, shaped like the messaging service's JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub reply_to_message: Option<Box<Message>>,
}

impl Message {
    pub fn sender_id(&self) -> Option<i64> {
        self.from.as_ref().map(|user| user.id)
    }

    /// The message as a snippet sees it: a dict with the JSON field names.
    pub fn to_value(&self) -> Value {
        to_value(self)
    }
}

impl Chat {
    pub fn to_value(&self) -> Value {
        to_value(self)
    }
}

fn to_value<T: Serialize>(item: &T) -> Value {
    serde_json::to_value(item)
        .map(Value::from)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"{
        "message_id": 42,
        "chat": {"id": -100, "type": "supergroup", "title": "ops"},
        "from": {"id": 7, "username": "root", "first_name": "Ro"},
        "text": "!eval 1+1",
        "reply_to_message": {
            "message_id": 41,
            "chat": {"id": -100, "type": "supergroup"},
            "text": "hello"
        }
    }"#;

    #[test]
    fn test_deserialize() {
        let message: Message = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(message.chat.kind, ChatKind::Supergroup);
        assert_eq!(message.sender_id(), Some(7));
        assert_eq!(
            message.reply_to_message.as_ref().and_then(|m| m.text.as_deref()),
            Some("hello")
        );
    }

    #[test]
    fn test_value_view() {
        let message: Message = serde_json::from_str(SAMPLE).unwrap();
        let Value::Dict(fields) = message.to_value() else {
            panic!("message should map to a dict");
        };
        assert_eq!(fields.get("message_id"), Some(&Value::Int(42)));
        assert_eq!(fields.get("text"), Some(&Value::from("!eval 1+1")));
        let Some(Value::Dict(chat)) = fields.get("chat") else {
            panic!("chat should map to a dict");
        };
        assert_eq!(chat.get("type"), Some(&Value::from("supergroup")));
    }
}
