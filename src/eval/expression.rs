use std::collections::BTreeMap;
use std::sync::Arc;

use async_recursion::async_recursion;

use super::builtins::{self, call_builtin, no_attribute, Arguments};
use super::context::ExecutionContext;
use super::evaluator::{EvalError, EvalResult};
use super::operators::{binary_op, compare_op, unary_op};
use super::pending::settle;
use super::value::{Value, MAX_VALUE_DEPTH};
use crate::ast::{self, Argument, BinaryOperator, Expression, LogicalOperator};

#[derive(Default)]
pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluates `expr`.
    ///
    /// The parser builds left-leaning chains (`a + b + c`, `m.chat.id`,
    /// `f()()`) without a nesting limit, so their left spine is walked in a
    /// loop here. Every other child costs one level of
    /// [`ExecutionContext::descend`].
    #[async_recursion]
    pub async fn eval_expression(
        &self,
        expr: &Expression,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        let _depth = context.descend()?;
        let mut links = Vec::new();
        let mut base = expr;
        while let Some((inner, link)) = split_link(base) {
            links.push(link);
            base = inner;
        }

        let mut value = self.eval_base(base, context.clone()).await?;
        for link in links.into_iter().rev() {
            value = self.apply_link(link, value, context.clone()).await?;
        }
        Ok(value)
    }

    async fn eval_base(&self, expr: &Expression, context: Arc<ExecutionContext>) -> EvalResult<Value> {
        match expr {
            Expression::Literal(literal) => Ok(Self::eval_literal(literal)),
            Expression::Variable(name) => context.lookup(name),
            Expression::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expression(item, context.clone()).await?);
                }
                within_nesting_limit(Value::List(values))
            }
            Expression::Dict(pairs) => self.eval_dict(pairs, context).await,
            Expression::UnaryOp { op, operand } => {
                let operand = self.eval_expression(operand, context).await?;
                unary_op(*op, &operand)
            }
            Expression::Compare { first, rest } => {
                let mut left = self.eval_expression(first, context.clone()).await?;
                for (op, operand) in rest {
                    let right = self.eval_expression(operand, context.clone()).await?;
                    if !compare_op(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expression::Await(inner) => {
                let value = self.eval_expression(inner, context.clone()).await?;
                if !matches!(value, Value::Pending(_)) {
                    return Err(EvalError::Type(format!(
                        "object {} can't be used in 'await' expression",
                        value.type_name()
                    )));
                }
                settle(value, context.settle_policy()).await
            }
            Expression::BinaryOp { .. }
            | Expression::Logical { .. }
            | Expression::Attribute { .. }
            | Expression::Index { .. }
            | Expression::Call { .. } => unreachable!("chain links are split off first"),
        }
    }

    /// Finishes one chain link whose left side evaluated to `left`.
    async fn apply_link(
        &self,
        link: Link<'_>,
        left: Value,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        match link {
            Link::Binary(op, right) => {
                let right = self.eval_expression(right, context).await?;
                binary_op(op, &left, &right)
            }
            Link::Logical(op, right) => {
                let short_circuit = match op {
                    LogicalOperator::And => !left.is_truthy(),
                    LogicalOperator::Or => left.is_truthy(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval_expression(right, context).await
                }
            }
            Link::Attribute(name) => get_attribute(&left, name),
            Link::Index(index) => {
                let index = self.eval_expression(index, context).await?;
                get_item(&left, &index)
            }
            Link::Call(arguments) => {
                let arguments = self.eval_arguments(arguments, context.clone()).await?;
                call_value(&left, arguments, &context)
            }
        }
    }

    fn eval_literal(literal: &ast::Literal) -> Value {
        match literal {
            ast::Literal::Integer(i) => Value::Int(*i),
            ast::Literal::Float(f) => Value::Float(*f),
            ast::Literal::String(s) => Value::Str(s.clone()),
            ast::Literal::Boolean(b) => Value::Bool(*b),
            ast::Literal::None => Value::None,
        }
    }

    async fn eval_dict(
        &self,
        pairs: &[(Expression, Expression)],
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        let mut entries = BTreeMap::new();
        for (key, value) in pairs {
            let key = match self.eval_expression(key, context.clone()).await? {
                Value::Str(key) => key,
                other => {
                    return Err(EvalError::Type(format!(
                        "dict keys must be str, not {}",
                        other.type_name()
                    )))
                }
            };
            let value = self.eval_expression(value, context.clone()).await?;
            entries.insert(key, value);
        }
        within_nesting_limit(Value::Dict(entries))
    }

    pub async fn eval_arguments(
        &self,
        arguments: &[Argument],
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Arguments> {
        let mut evaluated = Arguments::default();
        for argument in arguments {
            match argument {
                Argument::Positional(value) => {
                    let value = self.eval_expression(value, context.clone()).await?;
                    evaluated.positional.push(value);
                }
                Argument::Named { name, value } => {
                    let value = self.eval_expression(value, context.clone()).await?;
                    if evaluated.named.insert(name.clone(), value).is_some() {
                        return Err(EvalError::Syntax(format!(
                            "keyword argument repeated: {}",
                            name
                        )));
                    }
                }
            }
        }
        Ok(evaluated)
    }
}

/// The part of a left-leaning node that is applied after its left side.
enum Link<'a> {
    Binary(BinaryOperator, &'a Expression),
    Logical(LogicalOperator, &'a Expression),
    Attribute(&'a str),
    Index(&'a Expression),
    Call(&'a [Argument]),
}

fn split_link(expr: &Expression) -> Option<(&Expression, Link<'_>)> {
    match expr {
        Expression::BinaryOp { op, left, right } => Some((left.as_ref(), Link::Binary(*op, right))),
        Expression::Logical { op, left, right } => {
            Some((left.as_ref(), Link::Logical(*op, right)))
        }
        Expression::Attribute { object, name } => Some((object.as_ref(), Link::Attribute(name))),
        Expression::Index { object, index } => Some((object.as_ref(), Link::Index(index))),
        Expression::Call {
            function,
            arguments,
        } => Some((function.as_ref(), Link::Call(arguments))),
        _ => None,
    }
}

/// Rejects containers nested deeper than [`MAX_VALUE_DEPTH`].
pub fn within_nesting_limit(value: Value) -> EvalResult<Value> {
    if value.nests_deeper_than(MAX_VALUE_DEPTH) {
        return Err(EvalError::Recursion(
            "maximum nesting depth exceeded".to_string(),
        ));
    }
    Ok(value)
}

/// `object.name`. Dict keys are reachable as attributes, so `m.chat.id`
/// works on a message dict.
pub fn get_attribute(object: &Value, name: &str) -> EvalResult<Value> {
    let found = match object {
        Value::Object(host) => host.attribute(name),
        Value::Dict(entries) => entries.get(name).cloned(),
        _ => None,
    };
    match found {
        Some(value) => Ok(value),
        None if builtins::has_method(object, name) => Ok(Value::BoundMethod {
            receiver: Box::new(object.clone()),
            name: name.to_string(),
        }),
        None => Err(no_attribute(object, name)),
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let index = if index < 0 { index + len } else { index };
    (0..len).contains(&index).then_some(index as usize)
}

fn index_type_error(container: &Value, index: &Value) -> EvalError {
    EvalError::Type(format!(
        "{} indices must be integers, not {}",
        container.type_name(),
        index.type_name()
    ))
}

/// `object[index]`.
pub fn get_item(object: &Value, index: &Value) -> EvalResult<Value> {
    match object {
        Value::List(items) => {
            let position = index.as_int().ok_or_else(|| index_type_error(object, index))?;
            normalize_index(position, items.len())
                .map(|i| items[i].clone())
                .ok_or_else(|| EvalError::Index("list index out of range".to_string()))
        }
        Value::Str(s) => {
            let position = index.as_int().ok_or_else(|| index_type_error(object, index))?;
            let chars: Vec<char> = s.chars().collect();
            normalize_index(position, chars.len())
                .map(|i| Value::Str(chars[i].to_string()))
                .ok_or_else(|| EvalError::Index("string index out of range".to_string()))
        }
        Value::Dict(entries) => match index {
            Value::Str(key) => entries
                .get(key)
                .cloned()
                .ok_or_else(|| EvalError::Key(index.repr())),
            _ => Err(EvalError::Key(index.repr())),
        },
        other => Err(EvalError::Type(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// Returns `container` with `container[index] = value` applied.
pub fn set_item(container: Value, index: &Value, value: Value) -> EvalResult<Value> {
    if value.nests_deeper_than(MAX_VALUE_DEPTH - 1) {
        return Err(EvalError::Recursion(
            "maximum nesting depth exceeded".to_string(),
        ));
    }
    match container {
        Value::List(mut items) => {
            let position = index
                .as_int()
                .ok_or_else(|| index_type_error(&Value::List(Vec::new()), index))?;
            let slot = normalize_index(position, items.len()).ok_or_else(|| {
                EvalError::Index("list assignment index out of range".to_string())
            })?;
            items[slot] = value;
            Ok(Value::List(items))
        }
        Value::Dict(mut entries) => match index {
            Value::Str(key) => {
                entries.insert(key.clone(), value);
                Ok(Value::Dict(entries))
            }
            other => Err(EvalError::Type(format!(
                "dict keys must be str, not {}",
                other.type_name()
            ))),
        },
        other => Err(EvalError::Type(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

pub fn call_value(
    callee: &Value,
    arguments: Arguments,
    context: &ExecutionContext,
) -> EvalResult<Value> {
    match callee {
        Value::Builtin(builtin) => call_builtin(*builtin, arguments, context),
        Value::BoundMethod { receiver, name } => builtins::call_method(receiver, name, arguments),
        other => Err(EvalError::Type(format!(
            "'{}' object is not callable",
            other.type_name()
        ))),
    }
}
