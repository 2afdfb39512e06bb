//! Source text to executable unit.
//!
//! A [`SynthesizedUnit`] is the parsed snippet plus the wrapper every call
//! goes through: the declared keyword-only parameters, and in expression mode
//! the identity merge and the trailing-expression return.

use std::collections::BTreeMap;

use tracing::{debug, error};

use super::Bindings;
use crate::analyzer::{line_at, parse_snippet, ParseError};
use crate::ast::{Statement, StatementKind, Statements};
use crate::config::IdentityConfig;
use crate::eval::{EvalError, EvalResult, Failure, TraceFrame, Value};
use crate::tokenizer::{Tokenizer, TokenizerError};

/// Reserved name of the synthesized unit.
pub const UNIT_NAME: &str = "_snippet";

/// Reserved name of the hidden parameter carrying the caller identity.
pub const IDENTITY_BINDING: &str = "_globs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    /// `!eval`: the trailing expression is the result.
    Expression,
    /// `!exec`: statements only, the printed output is the result.
    Block,
}

#[derive(Debug, Clone)]
pub struct SynthesizedUnit {
    pub name: String,
    pub identity_binding: Option<String>,
    pub identity: BTreeMap<String, Value>,
    pub parameters: Vec<String>,
    pub body: Statements,
    pub mode: Mode,
    pub source: String,
}

impl SynthesizedUnit {
    /// Matches call-site bindings against the declared parameters, the way a
    /// keyword-only call would.
    pub fn bind(&self, bindings: &Bindings) -> EvalResult<Vec<(String, Value)>> {
        let declared: Vec<&str> = self
            .parameters
            .iter()
            .map(String::as_str)
            .filter(|name| Some(*name) != self.identity_binding.as_deref())
            .collect();

        if let Some(unexpected) = bindings.names().find(|name| !declared.contains(name)) {
            return Err(EvalError::Type(format!(
                "{}() got an unexpected keyword argument '{}'",
                self.name, unexpected
            )));
        }

        let missing: Vec<String> = declared
            .iter()
            .filter(|name| bindings.get(name).is_none())
            .map(|name| format!("'{}'", name))
            .collect();
        if !missing.is_empty() {
            return Err(EvalError::Type(format!(
                "{}() missing {} required keyword-only argument{}: {}",
                self.name,
                missing.len(),
                if missing.len() == 1 { "" } else { "s" },
                missing.join(" and ")
            )));
        }

        let mut bound: Vec<(String, Value)> = bindings
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        if let Some(binding) = &self.identity_binding {
            bound.push((binding.clone(), Value::Dict(self.identity.clone())));
        }
        Ok(bound)
    }
}

pub struct CodeSynthesizer {
    identity: BTreeMap<String, Value>,
}

impl CodeSynthesizer {
    pub fn new(identity: &IdentityConfig) -> Self {
        let mut values = BTreeMap::new();
        values.insert("__name__".to_string(), Value::from(identity.name.as_str()));
        values.insert(
            "__package__".to_string(),
            identity
                .package
                .as_deref()
                .map_or(Value::None, Value::from),
        );
        Self { identity: values }
    }

    pub fn synthesize(
        &self,
        source: &str,
        binding_names: &[&str],
        mode: Mode,
    ) -> Result<SynthesizedUnit, Failure> {
        let (name, identity_binding) = negotiate_names(binding_names);

        let spans = Tokenizer::new().tokenize(source).map_err(|err| {
            error!(%err, "snippet failed to tokenize");
            tokenizer_failure(source, &err)
        })?;
        let mut body = parse_snippet(&spans).map_err(|err| {
            let line = line_at(&spans, err.position());
            debug!(%err, line, "snippet failed to parse");
            let message = match err.root() {
                ParseError::Fail { message, .. } => message.clone(),
                other => format!("invalid syntax ({})", other),
            };
            Failure::syntax(message, TraceFrame::at(source, line, None))
        })?;

        let mut parameters: Vec<String> = binding_names.iter().map(|n| n.to_string()).collect();
        let identity_binding = match mode {
            Mode::Expression => {
                return_trailing_expression(&mut body);
                body.insert(
                    0,
                    Statement::new(
                        StatementKind::MergeIdentity {
                            binding: identity_binding.clone(),
                        },
                        1,
                    ),
                );
                parameters.push(identity_binding.clone());
                Some(identity_binding)
            }
            Mode::Block => None,
        };

        debug!(
            unit = %name,
            %mode,
            statements = body.len(),
            parameters = ?parameters,
            "unit synthesized"
        );
        Ok(SynthesizedUnit {
            name,
            identity: if identity_binding.is_some() {
                self.identity.clone()
            } else {
                BTreeMap::new()
            },
            identity_binding,
            parameters,
            body,
            mode,
            source: source.to_string(),
        })
    }
}

/// Prefixes both reserved names with `_` until neither collides with a
/// binding.
pub fn negotiate_names(names: &[&str]) -> (String, String) {
    let mut unit = UNIT_NAME.to_string();
    let mut identity = IDENTITY_BINDING.to_string();
    while names.contains(&unit.as_str()) || names.contains(&identity.as_str()) {
        unit.insert(0, '_');
        identity.insert(0, '_');
    }
    (unit, identity)
}

fn return_trailing_expression(body: &mut Statements) {
    if let Some(last) = body.last_mut() {
        if let StatementKind::Expression(expr) = &last.kind {
            last.kind = StatementKind::Return(Some(expr.clone()));
        }
    }
}

fn tokenizer_failure(source: &str, err: &TokenizerError) -> Failure {
    let message = match err {
        TokenizerError::ParseError { message, .. } => message.clone(),
    };
    Failure::syntax(message, TraceFrame::at(source, err.line(), None))
}
