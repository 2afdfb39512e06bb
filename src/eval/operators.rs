//! Arithmetic, comparison and membership on [`Value`]s.

use std::cmp::Ordering;
use std::sync::Arc;

use super::evaluator::{EvalError, EvalResult};
use super::value::Value;
use crate::ast::{BinaryOperator, CompareOperator, UnaryOperator};

fn overflow() -> EvalError {
    EvalError::Overflow("integer overflow".to_string())
}

pub fn binary_op(op: BinaryOperator, left: &Value, right: &Value) -> EvalResult<Value> {
    match op {
        BinaryOperator::Add => add(left, right),
        BinaryOperator::Subtract => numeric(op, left, right, i64::checked_sub, |a, b| a - b),
        BinaryOperator::Multiply => multiply(left, right),
        BinaryOperator::Divide => divide(left, right),
        BinaryOperator::FloorDivide => floor_divide(left, right),
        BinaryOperator::Modulo => modulo(left, right),
        BinaryOperator::Power => power(left, right),
    }
}

fn numeric(
    op: BinaryOperator,
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> EvalResult<Value> {
    match (left, right) {
        (Value::Float(_), _) | (_, Value::Float(_)) => match (left.as_float(), right.as_float()) {
            (Some(a), Some(b)) => Ok(Value::Float(float_op(a, b))),
            _ => Err(EvalError::unsupported_operand(op, left, right)),
        },
        _ => match (left.as_int(), right.as_int()) {
            (Some(a), Some(b)) => int_op(a, b).map(Value::Int).ok_or_else(overflow),
            _ => Err(EvalError::unsupported_operand(op, left, right)),
        },
    }
}

fn add(left: &Value, right: &Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
        (Value::List(a), Value::List(b)) => {
            let mut items = a.clone();
            items.extend(b.iter().cloned());
            Ok(Value::List(items))
        }
        _ => numeric(BinaryOperator::Add, left, right, i64::checked_add, |a, b| a + b),
    }
}

fn repeat_count(count: i64) -> usize {
    usize::try_from(count).unwrap_or(0)
}

fn multiply(left: &Value, right: &Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
            Ok(Value::Str(s.repeat(repeat_count(*n))))
        }
        (Value::List(items), Value::Int(n)) | (Value::Int(n), Value::List(items)) => {
            let count = repeat_count(*n);
            let mut repeated = Vec::new();
            for _ in 0..count {
                repeated.extend(items.iter().cloned());
            }
            Ok(Value::List(repeated))
        }
        _ => numeric(
            BinaryOperator::Multiply,
            left,
            right,
            i64::checked_mul,
            |a, b| a * b,
        ),
    }
}

fn float_operands(op: BinaryOperator, left: &Value, right: &Value) -> EvalResult<(f64, f64)> {
    match (left.as_float(), right.as_float()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(EvalError::unsupported_operand(op, left, right)),
    }
}

fn divide(left: &Value, right: &Value) -> EvalResult<Value> {
    let (a, b) = float_operands(BinaryOperator::Divide, left, right)?;
    if b == 0.0 {
        return Err(EvalError::ZeroDivision("division by zero".to_string()));
    }
    Ok(Value::Float(a / b))
}

fn floor_divide(left: &Value, right: &Value) -> EvalResult<Value> {
    if let (Some(a), Some(b)) = (left.as_int(), right.as_int()) {
        if b == 0 {
            return Err(EvalError::ZeroDivision(
                "integer division or modulo by zero".to_string(),
            ));
        }
        let quotient = a.checked_div(b).ok_or_else(overflow)?;
        let adjust = a % b != 0 && ((a < 0) != (b < 0));
        return Ok(Value::Int(if adjust { quotient - 1 } else { quotient }));
    }
    let (a, b) = float_operands(BinaryOperator::FloorDivide, left, right)?;
    if b == 0.0 {
        return Err(EvalError::ZeroDivision(
            "float floor division by zero".to_string(),
        ));
    }
    Ok(Value::Float((a / b).floor()))
}

fn modulo(left: &Value, right: &Value) -> EvalResult<Value> {
    if let (Some(a), Some(b)) = (left.as_int(), right.as_int()) {
        if b == 0 {
            return Err(EvalError::ZeroDivision(
                "integer division or modulo by zero".to_string(),
            ));
        }
        let remainder = a.checked_rem(b).ok_or_else(overflow)?;
        let adjust = remainder != 0 && ((remainder < 0) != (b < 0));
        return Ok(Value::Int(if adjust { remainder + b } else { remainder }));
    }
    let (a, b) = float_operands(BinaryOperator::Modulo, left, right)?;
    if b == 0.0 {
        return Err(EvalError::ZeroDivision("float modulo".to_string()));
    }
    let remainder = a % b;
    let adjust = remainder != 0.0 && ((remainder < 0.0) != (b < 0.0));
    Ok(Value::Float(if adjust { remainder + b } else { remainder }))
}

fn power(left: &Value, right: &Value) -> EvalResult<Value> {
    if let (Some(base), Some(exponent)) = (left.as_int(), right.as_int()) {
        if exponent >= 0 {
            let exponent = u32::try_from(exponent).map_err(|_| overflow())?;
            return base.checked_pow(exponent).map(Value::Int).ok_or_else(overflow);
        }
    }
    let (a, b) = float_operands(BinaryOperator::Power, left, right)?;
    if a == 0.0 && b < 0.0 {
        return Err(EvalError::ZeroDivision(
            "0.0 cannot be raised to a negative power".to_string(),
        ));
    }
    Ok(Value::Float(a.powf(b)))
}

pub fn unary_op(op: UnaryOperator, operand: &Value) -> EvalResult<Value> {
    match (op, operand) {
        (UnaryOperator::Not, value) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOperator::Negate, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOperator::Plus, Value::Float(f)) => Ok(Value::Float(*f)),
        (UnaryOperator::Negate, value) if value.as_int().is_some() => value
            .as_int()
            .and_then(i64::checked_neg)
            .map(Value::Int)
            .ok_or_else(overflow),
        (UnaryOperator::Plus, value) if value.as_int().is_some() => {
            Ok(Value::Int(value.as_int().unwrap_or_default()))
        }
        (op, value) => Err(EvalError::Type(format!(
            "bad operand type for unary {}: '{}'",
            op,
            value.type_name()
        ))),
    }
}

/// Ordering used by `<`, `sorted`, `min` and `max`.
pub fn compare(left: &Value, right: &Value) -> EvalResult<Ordering> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::List(a), Value::List(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                if x != y {
                    return compare(x, y);
                }
            }
            Ok(a.len().cmp(&b.len()))
        }
        _ if left.as_int().is_some() && right.as_int().is_some() => {
            Ok(left.as_int().cmp(&right.as_int()))
        }
        _ => match (left.as_float(), right.as_float()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).ok_or_else(|| {
                EvalError::Value("cannot order NaN".to_string())
            }),
            _ => Err(EvalError::Type(format!(
                "'<' not supported between instances of '{}' and '{}'",
                left.type_name(),
                right.type_name()
            ))),
        },
    }
}

/// `needle in haystack`.
pub fn contains(haystack: &Value, needle: &Value) -> EvalResult<bool> {
    match (haystack, needle) {
        (Value::Str(s), Value::Str(sub)) => Ok(s.contains(sub.as_str())),
        (Value::Str(_), other) => Err(EvalError::Type(format!(
            "'in <string>' requires string as left operand, not {}",
            other.type_name()
        ))),
        (Value::List(items), value) => Ok(items.contains(value)),
        (Value::Dict(entries), Value::Str(key)) => Ok(entries.contains_key(key)),
        (Value::Dict(_), _) => Ok(false),
        (other, _) => Err(EvalError::Type(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

pub fn compare_op(op: CompareOperator, left: &Value, right: &Value) -> EvalResult<bool> {
    Ok(match op {
        CompareOperator::Equal => left == right,
        CompareOperator::NotEqual => left != right,
        CompareOperator::Less => compare(left, right)? == Ordering::Less,
        CompareOperator::LessEqual => compare(left, right)? != Ordering::Greater,
        CompareOperator::Greater => compare(left, right)? == Ordering::Greater,
        CompareOperator::GreaterEqual => compare(left, right)? != Ordering::Less,
        CompareOperator::In => contains(right, left)?,
        CompareOperator::NotIn => !contains(right, left)?,
        CompareOperator::Is => identical(left, right),
        CompareOperator::IsNot => !identical(left, right),
    })
}

/// `is`. Host objects and pending values compare by reference. Everything
/// else is copied by value, so two values of the same type are identical
/// when they are equal.
fn identical(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
        (Value::Pending(a), Value::Pending(b)) => a.same_as(b),
        _ => std::mem::discriminant(left) == std::mem::discriminant(right) && left == right,
    }
}
