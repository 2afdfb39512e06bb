//! # Bot Surface
//!
//! The chat-facing side of the crate: recognizing `!eval` / `!exec`,
//! checking the sender against the sudoers list, building the bindings a
//! snippet sees, and delivering the reply.
//!
//! The messaging service itself stays outside; [`client::ChatClient`] is the
//! seam it plugs into.

pub mod client;
pub mod commands;
pub mod dispatcher;
pub mod message;
pub mod repository;

pub use client::{ChatClient, ClientHandle, DeliveryError};
pub use commands::{AdminCommand, CommandKind};
pub use dispatcher::{Dispatcher, Reply};
pub use message::{Chat, ChatKind, Message, User};
pub use repository::RepositoryHandle;
