//! Snippet Evaluation System
//!
//! Walks the syntax tree of a synthesized unit and produces a [`Value`] or an
//! [`EvalError`]. The evaluator has no ambient access to the host: every name
//! a snippet can reach is a frame local, an injected binding, an identity
//! name, a namespace entry, or an entry of the [`CapabilityTable`].
//!
//! # Core Components
//!
//! ## Evaluator
//! Entry point that runs a unit body and turns a trailing `return` into the
//! unit's value.
//!
//! ## Statement Evaluator
//! Assignments, control flow, `raise`, and the identity merge inserted by the
//! synthesizer.
//!
//! ## Expression Evaluator
//! Literals, names, attribute and item access, calls, operators and `await`.
//!
//! ## Execution Context
//! Per-frame state: locals, the identity overlay, the commit journal, the
//! output sink and the line currently executing.
//!
//! ## Capability Table
//! The enumerated builtins ([`builtins`]) and the methods of `str`, `list`
//! and `dict`.
//!
//! # Evaluation Pipeline
//!
//! 1. The engine prepares an [`ExecutionContext`] and binds parameters
//! 2. [`Evaluator::eval_unit`] evaluates the body statement by statement
//! 3. Pending values are resolved by `await` or by the driver through [`settle`]
//! 4. Failures surface as [`EvalError`] and are turned into a [`Failure`] by the engine

pub mod builtins;
pub mod context;
pub mod evaluator;
pub mod expression;
pub mod operators;
pub mod output;
pub mod pending;
pub mod statement;
pub mod value;

pub use builtins::{Arguments, Builtin, BuiltinFunction, CapabilityTable};
pub use context::ExecutionContext;
pub use evaluator::{
    EvalError, EvalResult, Evaluator, Exception, ExceptionKind, Failure, FailureKind, TraceFrame,
};
pub use output::OutputSink;
pub use pending::{settle, Pending, SettlePolicy};
pub use value::{HostObject, Value};
