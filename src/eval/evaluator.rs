use std::fmt;
use std::sync::Arc;

use strum::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

use super::{
    context::ExecutionContext,
    statement::{ControlFlow, StatementEvaluator, StatementResult},
    value::Value,
};
use crate::ast::Statements;

/// Exception categories a snippet can raise or observe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, EnumIter,
)]
pub enum ExceptionKind {
    Exception,
    ValueError,
    TypeError,
    KeyError,
    IndexError,
    RuntimeError,
    NameError,
    AttributeError,
    ZeroDivisionError,
    OverflowError,
    RecursionError,
    TimeoutError,
    PermissionError,
    SyntaxError,
    SystemError,
}

/// An exception value: what `raise` throws and what `ValueError("...")` builds.
#[derive(Debug, Clone, PartialEq)]
pub struct Exception {
    pub kind: ExceptionKind,
    pub message: String,
}

impl Exception {
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("name '{0}' is not defined")]
    Name(String),
    #[error("{0}")]
    Type(String),
    #[error("{0}")]
    Value(String),
    #[error("{0}")]
    Key(String),
    #[error("{0}")]
    Index(String),
    #[error("{0}")]
    Attribute(String),
    #[error("{0}")]
    ZeroDivision(String),
    #[error("{0}")]
    Overflow(String),
    #[error("{0}")]
    Recursion(String),
    #[error("{0}")]
    Timeout(String),
    #[error("{0}")]
    Runtime(String),
    #[error("{0}")]
    Syntax(String),
    #[error("{0}")]
    Raised(Exception),
    #[error("{0}")]
    Panic(String),
}

pub type EvalResult<T> = Result<T, EvalError>;

impl EvalError {
    pub fn kind(&self) -> ExceptionKind {
        match self {
            EvalError::Name(_) => ExceptionKind::NameError,
            EvalError::Type(_) => ExceptionKind::TypeError,
            EvalError::Value(_) => ExceptionKind::ValueError,
            EvalError::Key(_) => ExceptionKind::KeyError,
            EvalError::Index(_) => ExceptionKind::IndexError,
            EvalError::Attribute(_) => ExceptionKind::AttributeError,
            EvalError::ZeroDivision(_) => ExceptionKind::ZeroDivisionError,
            EvalError::Overflow(_) => ExceptionKind::OverflowError,
            EvalError::Recursion(_) => ExceptionKind::RecursionError,
            EvalError::Timeout(_) => ExceptionKind::TimeoutError,
            EvalError::Runtime(_) => ExceptionKind::RuntimeError,
            EvalError::Syntax(_) => ExceptionKind::SyntaxError,
            EvalError::Raised(exception) => exception.kind,
            EvalError::Panic(_) => ExceptionKind::SystemError,
        }
    }

    pub fn to_exception(&self) -> Exception {
        Exception::new(self.kind(), self.to_string())
    }

    pub fn unsupported_operand(op: impl fmt::Display, left: &Value, right: &Value) -> Self {
        EvalError::Type(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op,
            left.type_name(),
            right.type_name()
        ))
    }
}

impl From<Exception> for EvalError {
    fn from(exception: Exception) -> Self {
        EvalError::Raised(exception)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum FailureKind {
    Syntax,
    Runtime,
}

/// One line of a failure's trace.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceFrame {
    pub line: usize,
    /// Name of the synthesized unit; `None` when the failure happened before
    /// a unit existed (syntax errors).
    pub unit: Option<String>,
    pub source: Option<String>,
}

impl TraceFrame {
    /// Builds a frame, pulling the offending line out of `source`.
    pub fn at(source: &str, line: usize, unit: Option<String>) -> Self {
        let text = source
            .lines()
            .nth(line.saturating_sub(1))
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        Self {
            line,
            unit,
            source: text,
        }
    }
}

/// Structured result of a failed evaluation. Only [`Failure::diagnostic`]
/// turns it into text, and only the messaging boundary calls that.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{category}: {message}")]
pub struct Failure {
    pub kind: FailureKind,
    pub category: String,
    pub message: String,
    pub trace: Vec<TraceFrame>,
}

impl Failure {
    pub fn syntax(message: impl Into<String>, frame: TraceFrame) -> Self {
        Self {
            kind: FailureKind::Syntax,
            category: ExceptionKind::SyntaxError.to_string(),
            message: message.into(),
            trace: vec![frame],
        }
    }

    pub fn runtime(error: &EvalError, trace: Vec<TraceFrame>) -> Self {
        Self {
            kind: FailureKind::Runtime,
            category: error.kind().to_string(),
            message: error.to_string(),
            trace,
        }
    }

    /// Traceback-style rendering of the failure.
    pub fn diagnostic(&self) -> String {
        let mut out = String::new();
        if self.kind == FailureKind::Runtime {
            out.push_str("Traceback (most recent call last):\n");
        }
        for frame in &self.trace {
            match &frame.unit {
                Some(unit) => out.push_str(&format!(
                    "  File \"<snippet>\", line {}, in <{}>\n",
                    frame.line, unit
                )),
                None => out.push_str(&format!("  File \"<snippet>\", line {}\n", frame.line)),
            }
            if let Some(source) = &frame.source {
                out.push_str(&format!("    {}\n", source));
            }
        }
        if self.message.is_empty() {
            out.push_str(&self.category);
        } else {
            out.push_str(&format!("{}: {}", self.category, self.message));
        }
        out
    }
}

/// Runs a unit body to completion against a prepared context.
#[derive(Default)]
pub struct Evaluator {
    statement_evaluator: StatementEvaluator,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Top level entry point: a `return` ends the unit with its value, falling
    /// off the end yields `None`.
    pub async fn eval_unit(
        &self,
        body: &Statements,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        match self.statement_evaluator.eval_block(body, context).await? {
            StatementResult::Control(ControlFlow::Return(value)) => Ok(value),
            StatementResult::Control(ControlFlow::Break) => {
                Err(EvalError::Syntax("'break' outside loop".to_string()))
            }
            StatementResult::Control(ControlFlow::Continue) => {
                Err(EvalError::Syntax("'continue' not properly in loop".to_string()))
            }
            StatementResult::Value(_) => Ok(Value::None),
        }
    }
}
