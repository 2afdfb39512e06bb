use admin_eval::{
    bot::{
        client::DeliveryResult, AdminCommand, Chat, ChatClient, ChatKind, CommandKind, Dispatcher,
        Message, Reply, User,
    },
    engine::scope::{Isolation, Namespace},
    BotConfig, Error, AdminResult,
};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use std::{path::PathBuf, sync::Arc};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Override the configured isolation mode
    #[arg(short, long)]
    isolation: Option<Isolation>,

    /// Enable debug mode
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate an expression snippet
    Eval(SnippetArgs),
    /// Run a block snippet and print its output
    Exec(SnippetArgs),
}

#[derive(clap::Args)]
struct SnippetArgs {
    /// Snippet source
    source: Option<String>,

    /// Read the snippet from a file instead
    #[arg(short, long, conflicts_with = "source")]
    file: Option<PathBuf>,
}

impl SnippetArgs {
    fn read(&self) -> AdminResult<String> {
        match (&self.source, &self.file) {
            (Some(source), _) => Ok(source.clone()),
            (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
                Error::internal(format!("Failed to read snippet file {:?}: {}", path, e))
            }),
            (None, None) => Err(Error::internal("no snippet given")),
        }
    }
}

/// Stands in for the messaging service: outgoing messages are logged and
/// numbered.
#[derive(Default)]
struct ConsoleClient {
    next_id: Mutex<i64>,
}

impl ConsoleClient {
    fn message(&self, chat_id: i64, text: &str) -> Message {
        let mut next_id = self.next_id.lock();
        *next_id += 1;
        Message {
            message_id: *next_id,
            chat: console_chat(chat_id),
            from: None,
            text: Some(text.to_string()),
            reply_to_message: None,
        }
    }
}

#[async_trait]
impl ChatClient for ConsoleClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> DeliveryResult<Message> {
        info!(chat_id, ?reply_to, text, "send_message");
        Ok(self.message(chat_id, text))
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> DeliveryResult<Message> {
        info!(chat_id, message_id, text, "edit_message_text");
        let mut message = self.message(chat_id, text);
        message.message_id = message_id;
        Ok(message)
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> DeliveryResult<()> {
        info!(chat_id, message_id, "delete_message");
        Ok(())
    }

    async fn get_chat(&self, chat_id: i64) -> DeliveryResult<Chat> {
        Ok(console_chat(chat_id))
    }
}

fn console_chat(chat_id: i64) -> Chat {
    Chat {
        id: chat_id,
        kind: ChatKind::Private,
        title: None,
        username: Some("console".to_string()),
    }
}

/// Prints the reply. A failed snippet comes back as [`Error::Failure`] after
/// its diagnostic has been printed.
async fn run(cli: &Cli) -> AdminResult<()> {
    let mut config = BotConfig::from_file(&cli.config)?;
    if let Some(isolation) = cli.isolation {
        config.engine.isolation = isolation;
    }
    debug!("config: {:?}", config);

    let (kind, args) = match &cli.command {
        Command::Eval(args) => (CommandKind::Eval, args),
        Command::Exec(args) => (CommandKind::Exec, args),
    };
    let source = args.read()?;
    let operator = config.sudoers.first().copied().unwrap_or_default();
    let message = Message {
        message_id: 0,
        chat: console_chat(operator),
        from: Some(User {
            id: operator,
            username: None,
            first_name: "console".to_string(),
        }),
        text: Some(format!("!{} {}", kind, source)),
        reply_to_message: None,
    };

    let dispatcher = Dispatcher::new(
        config,
        Arc::new(ConsoleClient::default()),
        Arc::new(Namespace::new()),
    );
    let reply = dispatcher
        .run(&AdminCommand { kind, source }, &message)
        .await;
    println!("{}", reply.text());
    match reply {
        Reply::Failure(failure) => Err(failure.into()),
        _ => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(&cli).await {
        Ok(()) => {}
        Err(Error::Failure(_)) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
