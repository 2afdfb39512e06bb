use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use super::message::{Chat, Message};
use crate::eval::{Arguments, EvalError, EvalResult, HostObject, Pending, Value};

/// The messaging service rejected a request.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{description}")]
pub struct DeliveryError {
    pub description: String,
}

impl DeliveryError {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Outgoing side of the messaging service.
#[mockall::automock]
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> DeliveryResult<Message>;

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> DeliveryResult<Message>;

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> DeliveryResult<()>;

    async fn get_chat(&self, chat_id: i64) -> DeliveryResult<Chat>;
}

/// Exposes a [`ChatClient`] to snippets as `c`.
///
/// Every method returns a pending value, so snippets write
/// `await c.send_message(m.chat.id, "hi")`. Delivery errors surface as
/// `RuntimeError` inside the snippet.
pub struct ClientHandle {
    client: Arc<dyn ChatClient>,
    label: String,
}

impl ClientHandle {
    pub fn new(client: Arc<dyn ChatClient>, label: impl Into<String>) -> Self {
        Self {
            client,
            label: label.into(),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(Arc::new(self))
    }
}

const METHODS: [&str; 4] = ["send_message", "edit_message_text", "delete_message", "get_chat"];

impl HostObject for ClientHandle {
    fn type_name(&self) -> &str {
        "Client"
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "label" => Some(Value::from(self.label.as_str())),
            _ => None,
        }
    }

    fn has_method(&self, name: &str) -> bool {
        METHODS.contains(&name)
    }

    fn call_method(&self, name: &str, args: Arguments) -> EvalResult<Value> {
        let client = self.client.clone();
        debug!(client = %self.label, method = name, "client call");
        let pending = match name {
            "send_message" => {
                args.allow_named(name, &["chat_id", "text", "reply_to"])?;
                let chat_id = int_param(&args, name, 0, "chat_id")?;
                let text = str_param(&args, name, 1, "text")?;
                let reply_to = optional_int_param(&args, name, 2, "reply_to")?;
                Pending::new(format!("{}.send_message", self.label), async move {
                    let sent = client
                        .send_message(chat_id, &text, reply_to)
                        .await
                        .map_err(delivery_failed)?;
                    Ok(sent.to_value())
                })
            }
            "edit_message_text" => {
                args.allow_named(name, &["chat_id", "message_id", "text"])?;
                let chat_id = int_param(&args, name, 0, "chat_id")?;
                let message_id = int_param(&args, name, 1, "message_id")?;
                let text = str_param(&args, name, 2, "text")?;
                Pending::new(format!("{}.edit_message_text", self.label), async move {
                    let edited = client
                        .edit_message_text(chat_id, message_id, &text)
                        .await
                        .map_err(delivery_failed)?;
                    Ok(edited.to_value())
                })
            }
            "delete_message" => {
                args.allow_named(name, &["chat_id", "message_id"])?;
                let chat_id = int_param(&args, name, 0, "chat_id")?;
                let message_id = int_param(&args, name, 1, "message_id")?;
                Pending::new(format!("{}.delete_message", self.label), async move {
                    client
                        .delete_message(chat_id, message_id)
                        .await
                        .map_err(delivery_failed)?;
                    Ok(Value::Bool(true))
                })
            }
            "get_chat" => {
                args.allow_named(name, &["chat_id"])?;
                let chat_id = int_param(&args, name, 0, "chat_id")?;
                Pending::new(format!("{}.get_chat", self.label), async move {
                    let chat = client.get_chat(chat_id).await.map_err(delivery_failed)?;
                    Ok(chat.to_value())
                })
            }
            _ => {
                return Err(EvalError::Attribute(format!(
                    "'Client' object has no attribute '{}'",
                    name
                )))
            }
        };
        Ok(Value::Pending(pending))
    }

    fn repr(&self) -> String {
        format!("<Client {}>", self.label)
    }
}

fn delivery_failed(err: DeliveryError) -> EvalError {
    EvalError::Runtime(err.description)
}

fn param<'a>(args: &'a Arguments, index: usize, name: &str) -> Option<&'a Value> {
    args.get(index).or_else(|| args.named(name))
}

fn int_param(args: &Arguments, method: &str, index: usize, name: &str) -> EvalResult<i64> {
    match param(args, index, name) {
        Some(Value::Int(i)) => Ok(*i),
        Some(other) => Err(EvalError::Type(format!(
            "{}() argument '{}' must be int, not {}",
            method,
            name,
            other.type_name()
        ))),
        None => Err(EvalError::Type(format!(
            "{}() missing required argument: '{}'",
            method, name
        ))),
    }
}

fn optional_int_param(
    args: &Arguments,
    method: &str,
    index: usize,
    name: &str,
) -> EvalResult<Option<i64>> {
    match param(args, index, name) {
        None | Some(Value::None) => Ok(None),
        Some(_) => int_param(args, method, index, name).map(Some),
    }
}

fn str_param(args: &Arguments, method: &str, index: usize, name: &str) -> EvalResult<String> {
    match param(args, index, name) {
        Some(Value::Str(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
        None => Err(EvalError::Type(format!(
            "{}() missing required argument: '{}'",
            method, name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::message::ChatKind;
    use crate::eval::{settle, SettlePolicy};
    use mockall::predicate::*;
    use pretty_assertions::assert_eq;

    fn sent(chat_id: i64, message_id: i64, text: &str) -> Message {
        Message {
            message_id,
            chat: Chat {
                id: chat_id,
                kind: ChatKind::Private,
                title: None,
                username: None,
            },
            from: None,
            text: Some(text.to_string()),
            reply_to_message: None,
        }
    }

    #[tokio::test]
    async fn test_send_message_is_pending_until_awaited() {
        let mut client = MockChatClient::new();
        client
            .expect_send_message()
            .with(eq(5), eq("hi"), eq(None))
            .times(1)
            .returning(|chat_id, text, _| Ok(sent(chat_id, 9, text)));
        let handle = ClientHandle::new(Arc::new(client), "bot");

        let value = handle
            .call_method(
                "send_message",
                Arguments::new(vec![Value::Int(5)]).with_named("text", Value::from("hi")),
            )
            .unwrap();
        assert_eq!(value.type_name(), "coroutine");

        let Value::Dict(fields) = settle(value, &SettlePolicy::default()).await.unwrap() else {
            panic!("expected the sent message");
        };
        assert_eq!(fields.get("message_id"), Some(&Value::Int(9)));
    }

    #[tokio::test]
    async fn test_delivery_errors_become_runtime_errors() {
        let mut client = MockChatClient::new();
        client
            .expect_delete_message()
            .returning(|_, _| Err(DeliveryError::new("Message to delete not found")));
        let handle = ClientHandle::new(Arc::new(client), "bot");
        let value = handle
            .call_method(
                "delete_message",
                Arguments::new(vec![Value::Int(1), Value::Int(2)]),
            )
            .unwrap();
        let err = settle(value, &SettlePolicy::default()).await.unwrap_err();
        assert_eq!(err, EvalError::Runtime("Message to delete not found".into()));
    }

    #[test]
    fn test_attributes_and_argument_checks() {
        let handle = ClientHandle::new(Arc::new(MockChatClient::new()), "bot");
        assert_eq!(handle.attribute("label"), Some(Value::from("bot")));
        assert!(handle.has_method("get_chat"));
        assert!(!handle.has_method("restart"));
        assert!(matches!(
            handle.call_method("get_chat", Arguments::new(vec![Value::from("x")])),
            Err(EvalError::Type(_))
        ));
        assert!(matches!(
            handle.call_method("get_chat", Arguments::new(vec![]).with_named("chat", Value::Int(1))),
            Err(EvalError::Type(_))
        ));
    }
}
