//! # admin-eval: Live Code Evaluation for Chat-Bot Operators
//!
//! admin-eval lets trusted operators of a chat bot run code inside the bot
//! process with `!eval <expression>` and `!exec <block>`, without redeploying.
//!
//! ## Technical Foundations
//!
//! ### 1. Embedded Snippet Language
//! Snippets are written in a small Python-flavoured language and run by an
//! embedded interpreter rather than compiled into the host:
//! - Tokenization ([`tokenizer`])
//! - Parsing into an Abstract Syntax Tree ([`analyzer`], [`ast`])
//! - Evaluation ([`eval`])
//!
//! ### 2. Explicit Capabilities
//! A snippet reaches nothing it was not handed. Names resolve through the
//! frame, the injected bindings, the caller identity, the shared namespace
//! and the [`eval::CapabilityTable`], in that order.
//!
//! ### 3. Protected Shared State
//! The bot-wide [`engine::scope::Namespace`] is versioned. Under the default
//! `frame` isolation every write stays in the evaluation's own frame unless
//! published with `commit(name, value)`; the legacy `serialized` and
//! `snapshot` modes bracket each call with a snapshot and a restore.
//!
//! ### 4. Cooperative Async Execution
//! Snippets run on the tokio runtime. Host I/O returns pending values that
//! are awaited explicitly, and whatever is left pending is settled by a
//! bounded, time-limited loop ([`eval::settle`]).
//!
//! ### 5. Structured Failures
//! Every failure, including a panic in host code, comes back as an
//! [`eval::Failure`]. It becomes traceback text only at the messaging
//! boundary ([`bot::Dispatcher`]).
//!
//! ## Evaluation Pipeline
//!
//! ```text
//! chat message → AdminCommand → Engine → Synthesizer → Driver → Reply → chat
//!                                  │          │            │
//!                              ScopeManager  Tokenizer   Evaluator
//!                                            Analyzer
//! ```
//!
//! ### Stage 1: Dispatch
//!
//! The [`bot`] module recognizes the command, checks the sender against the
//! sudoers list and assembles the bindings (`m`, `c`, `git`).
//!
//! ### Stage 2: Synthesis
//!
//! [`engine::synthesizer`] tokenizes and parses the snippet and wraps it into
//! a unit: keyword-only parameters, the identity merge and, for `!eval`, the
//! trailing expression turned into a `return`.
//!
//! ### Stage 3: Execution
//!
//! [`engine::driver`] binds the parameters, walks the unit and settles the
//! result. For `!exec` the printed output is the result.

pub mod analyzer;
pub mod ast;
pub mod bot;
pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod tokenizer;

// Re-exports
pub use config::{BotConfig, EngineConfig};
pub use engine::{Bindings, Engine};
pub use error::*;
pub use eval::{Failure, Value};

#[cfg(test)]
mod tests {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    #[ctor::ctor]
    fn init_tests() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
    }
}
