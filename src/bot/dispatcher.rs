use std::sync::Arc;

use tracing::{debug, info, warn};

use super::client::{ChatClient, ClientHandle};
use super::commands::{AdminCommand, CommandKind};
use super::message::{ChatKind, Message};
use super::repository::RepositoryHandle;
use crate::config::BotConfig;
use crate::engine::scope::Namespace;
use crate::engine::{Bindings, Engine};
use crate::eval::{Failure, Value};

/// What a command produced, before it is turned into reply text.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Value(Value),
    Output(String),
    Failure(Failure),
}

impl Reply {
    pub fn text(&self) -> String {
        match self {
            Reply::Value(value) => value.to_string(),
            Reply::Output(output) => output.clone(),
            Reply::Failure(failure) => failure.diagnostic(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Reply::Failure(_))
    }
}

/// Routes administrative commands from chat messages to the engine and sends
/// the results back.
pub struct Dispatcher {
    config: BotConfig,
    client: Arc<dyn ChatClient>,
    engine: Engine,
}

impl Dispatcher {
    pub fn new(config: BotConfig, client: Arc<dyn ChatClient>, namespace: Arc<Namespace>) -> Self {
        let engine = Engine::new(config.engine.clone(), namespace);
        Self {
            config,
            client,
            engine,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Handles one incoming message. Returns `true` when it was an
    /// administrative command from a sudoer and a reply was attempted.
    #[tracing::instrument(
        level = "debug",
        skip(self, message),
        fields(chat_id = message.chat.id, message_id = message.message_id)
    )]
    pub async fn handle(&self, message: &Message) -> bool {
        let Some(text) = message.text.as_deref() else {
            return false;
        };
        if message.chat.kind == ChatKind::Channel {
            return false;
        }
        let Some(command) = AdminCommand::parse(text, self.config.bot_username.as_deref())
        else {
            return false;
        };
        match message.sender_id() {
            Some(user_id) if self.config.is_sudoer(user_id) => {}
            sender => {
                debug!(?sender, command = %command.kind, "command from non-sudoer ignored");
                return false;
            }
        }

        info!(command = %command.kind, sender = ?message.sender_id(), "admin command");
        let reply = self.run(&command, message).await;
        self.send_reply(message, &reply.text()).await;
        true
    }

    /// Runs a parsed command without any access checks.
    pub async fn run(&self, command: &AdminCommand, message: &Message) -> Reply {
        let client = ClientHandle::new(self.client.clone(), self.config.client_label.as_str())
            .into_value();
        match command.kind {
            CommandKind::Eval => {
                let bindings = Bindings::new()
                    .with("m", message.to_value())
                    .with("c", client)
                    .with(
                        "git",
                        RepositoryHandle::from(&self.config.repository).to_value(),
                    );
                match self.engine.evaluate(&command.source, &bindings).await {
                    Ok(value) => Reply::Value(value),
                    Err(failure) => Reply::Failure(failure),
                }
            }
            CommandKind::Exec => {
                match self
                    .engine
                    .execute(&command.source, client, message.to_value())
                    .await
                {
                    Ok(output) => Reply::Output(output),
                    Err(failure) => Reply::Failure(failure),
                }
            }
        }
    }

    /// Replies to `message`; if the service rejects the reply, sends the
    /// rejection reason instead.
    async fn send_reply(&self, message: &Message, text: &str) {
        let chat_id = message.chat.id;
        let reply_to = Some(message.message_id);
        if let Err(err) = self.client.send_message(chat_id, text, reply_to).await {
            warn!(%err, "reply rejected, sending the reason instead");
            if let Err(err) = self
                .client
                .send_message(chat_id, &err.description, reply_to)
                .await
            {
                warn!(%err, "fallback reply rejected as well");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::client::{DeliveryError, MockChatClient};
    use crate::bot::message::{Chat, User};
    use mockall::predicate::*;
    use mockall::Sequence;

    fn message(from: i64, kind: ChatKind, text: Option<&str>) -> Message {
        Message {
            message_id: 10,
            chat: Chat {
                id: 99,
                kind,
                title: None,
                username: None,
            },
            from: Some(User {
                id: from,
                username: None,
                first_name: "Op".to_string(),
            }),
            text: text.map(str::to_string),
            reply_to_message: None,
        }
    }

    fn dispatcher(client: MockChatClient) -> Dispatcher {
        let config = BotConfig {
            sudoers: vec![1],
            ..BotConfig::default()
        };
        Dispatcher::new(config, Arc::new(client), Arc::new(Namespace::new()))
    }

    #[tokio::test]
    async fn test_eval_replies_with_value() {
        let mut client = MockChatClient::new();
        client
            .expect_send_message()
            .with(eq(99), eq("2"), eq(Some(10)))
            .times(1)
            .returning(|chat_id, text, _| {
                let mut sent = message(0, ChatKind::Private, Some(text));
                sent.chat.id = chat_id;
                Ok(sent)
            });
        let dispatcher = dispatcher(client);
        assert!(
            dispatcher
                .handle(&message(1, ChatKind::Private, Some("!eval 1+1")))
                .await
        );
    }

    #[tokio::test]
    async fn test_exec_replies_with_output() {
        let mut client = MockChatClient::new();
        client
            .expect_send_message()
            .with(eq(99), eq("0\n1\n"), eq(Some(10)))
            .times(1)
            .returning(|_, text, _| Ok(message(0, ChatKind::Private, Some(text))));
        let dispatcher = dispatcher(client);
        assert!(
            dispatcher
                .handle(&message(
                    1,
                    ChatKind::Group,
                    Some("!exec for i in range(2):\n    print(i)")
                ))
                .await
        );
    }

    #[tokio::test]
    async fn test_ignored_messages() {
        let client = MockChatClient::new();
        let dispatcher = dispatcher(client);
        assert!(!dispatcher.handle(&message(2, ChatKind::Private, Some("!eval 1"))).await);
        assert!(!dispatcher.handle(&message(1, ChatKind::Channel, Some("!eval 1"))).await);
        assert!(!dispatcher.handle(&message(1, ChatKind::Group, None)).await);
        assert!(!dispatcher.handle(&message(1, ChatKind::Group, Some("hello"))).await);
    }

    #[tokio::test]
    async fn test_delivery_failure_sends_description() {
        let mut client = MockChatClient::new();
        let mut sequence = Sequence::new();
        client
            .expect_send_message()
            .with(eq(99), eq(""), eq(Some(10)))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _| Err(DeliveryError::new("Bad Request: message text is empty")));
        client
            .expect_send_message()
            .with(eq(99), eq("Bad Request: message text is empty"), eq(Some(10)))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _| Err(DeliveryError::new("still failing")));
        let dispatcher = dispatcher(client);
        assert!(
            dispatcher
                .handle(&message(1, ChatKind::Group, Some("!eval ''")))
                .await
        );
    }

    #[tokio::test]
    async fn test_run_reports_failures() {
        let dispatcher = dispatcher(MockChatClient::new());
        let command = AdminCommand::parse("!exec raise ValueError('boom')", None).unwrap();
        let reply = dispatcher
            .run(&command, &message(1, ChatKind::Private, None))
            .await;
        assert!(reply.is_failure());
        assert!(reply.text().ends_with("ValueError: boom"));
    }

    #[tokio::test]
    async fn test_eval_sees_bindings() {
        let dispatcher = dispatcher(MockChatClient::new());
        let command =
            AdminCommand::parse("!eval [m.chat.id, c.label, git.branch, m['from']['first_name']]", None)
                .unwrap();
        let reply = dispatcher
            .run(&command, &message(1, ChatKind::Private, None))
            .await;
        assert_eq!(reply.text(), "[99, 'bot', 'master', 'Op']");
    }
}
