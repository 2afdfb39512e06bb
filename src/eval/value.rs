use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::builtins::{Arguments, Builtin};
use super::evaluator::{EvalResult, Exception};
use super::pending::Pending;

/// Deepest nesting of lists, dicts and method receivers a snippet may build.
pub const MAX_VALUE_DEPTH: usize = 100;

/// Something owned by the host process that a snippet can poke at: the chat
/// client, for instance.
pub trait HostObject: Send + Sync {
    fn type_name(&self) -> &str;

    /// Plain attribute lookup; `None` falls through to methods.
    fn attribute(&self, name: &str) -> Option<Value>;

    fn has_method(&self, name: &str) -> bool;

    /// Called with already evaluated arguments. I/O should come back as a
    /// [`Value::Pending`] rather than block.
    fn call_method(&self, name: &str, args: Arguments) -> EvalResult<Value>;

    fn repr(&self) -> String {
        format!("<{} object>", self.type_name())
    }
}

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Dict(BTreeMap<String, Value>),
    Exception(Exception),
    Builtin(Builtin),
    BoundMethod { receiver: Box<Value>, name: String },
    Object(Arc<dyn HostObject>),
    Pending(Pending),
}

impl Value {
    pub fn type_name(&self) -> String {
        match self {
            Value::None => "NoneType".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Str(_) => "str".to_string(),
            Value::List(_) => "list".to_string(),
            Value::Dict(_) => "dict".to_string(),
            Value::Exception(e) => e.kind.to_string(),
            Value::Builtin(Builtin::Function(_)) => "builtin_function_or_method".to_string(),
            Value::Builtin(Builtin::Exception(_)) => "type".to_string(),
            Value::BoundMethod { .. } => "method".to_string(),
            Value::Object(object) => object.type_name().to_string(),
            Value::Pending(_) => "coroutine".to_string(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Dict(entries) => !entries.is_empty(),
            _ => true,
        }
    }

    /// Numeric view used by arithmetic; booleans count as integers.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            other => other.as_int().map(|i| i as f64),
        }
    }

    /// Whether containers nest more than `limit` levels below this value.
    /// Looks no further down than `limit`.
    pub fn nests_deeper_than(&self, limit: usize) -> bool {
        let deeper = |child: &Value| limit == 0 || child.nests_deeper_than(limit - 1);
        match self {
            Value::List(items) => items.iter().any(deeper),
            Value::Dict(entries) => entries.values().any(deeper),
            Value::BoundMethod { receiver, .. } => deeper(receiver.as_ref()),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// `repr()` text.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => quote(s),
            Value::List(items) => format!(
                "[{}]",
                items.iter().map(Value::repr).collect::<Vec<_>>().join(", ")
            ),
            Value::Dict(entries) => format!(
                "{{{}}}",
                entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", quote(k), v.repr()))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Value::Exception(e) => format!("{}({})", e.kind, quote(&e.message)),
            other => other.to_string(),
        }
    }
}

/// `str()` text.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Str(s) => write!(f, "{}", s),
            Value::Exception(e) => write!(f, "{}", e.message),
            Value::Builtin(Builtin::Function(function)) => {
                write!(f, "<built-in function {}>", function)
            }
            Value::Builtin(Builtin::Exception(kind)) => write!(f, "<class '{}'>", kind),
            Value::BoundMethod { receiver, name } => write!(
                f,
                "<built-in method {} of {} object>",
                name,
                receiver.type_name()
            ),
            Value::Object(object) => write!(f, "{}", object.repr()),
            Value::Pending(pending) => write!(f, "<coroutine {}>", pending.label()),
            Value::List(_) | Value::Dict(_) => write!(f, "{}", self.repr()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Exception(a), Value::Exception(b)) => a == b,
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (
                Value::BoundMethod {
                    receiver: ra,
                    name: na,
                },
                Value::BoundMethod {
                    receiver: rb,
                    name: nb,
                },
            ) => na == nb && ra == rb,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Float(_), _) | (_, Value::Float(_)) => {
                match (self.as_float(), other.as_float()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            _ => match (self.as_int(), other.as_int()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Dict(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Python-style float text: `1.0`, `0.1`, `1e+20`, `inf`.
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let magnitude = x.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let text = format!("{:e}", x);
        return match text.split_once('e') {
            Some((mantissa, exponent)) => {
                let (sign, digits) = match exponent.strip_prefix('-') {
                    Some(digits) => ('-', digits),
                    None => ('+', exponent),
                };
                format!("{}e{}{:0>2}", mantissa, sign, digits)
            }
            None => text,
        };
    }
    if x.fract() == 0.0 {
        format!("{:.1}", x)
    } else {
        format!("{}", x)
    }
}

fn quote(s: &str) -> String {
    let delimiter = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(delimiter);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == delimiter => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(delimiter);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::builtins::BuiltinFunction;
    use crate::eval::evaluator::ExceptionKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_nesting_depth() {
        let mut value = Value::Int(1);
        for _ in 0..3 {
            value = Value::List(vec![Value::None, value]);
        }
        assert!(!value.nests_deeper_than(3));
        assert!(value.nests_deeper_than(2));
        assert!(!Value::List(vec![]).nests_deeper_than(0));
        assert!(Value::List(vec![Value::Int(1)]).nests_deeper_than(0));
    }

    #[test]
    fn test_str_and_repr() {
        assert_eq!(Value::None.to_string(), "None");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::Str("hi".into()).to_string(), "hi");
        assert_eq!(Value::Str("hi".into()).repr(), "'hi'");
        assert_eq!(Value::Str("it's".into()).repr(), "\"it's\"");
        assert_eq!(Value::Str("a\nb".into()).repr(), "'a\\nb'");
        let list = Value::List(vec![Value::Int(1), Value::Str("a".into()), Value::None]);
        assert_eq!(list.to_string(), "[1, 'a', None]");
        let mut entries = BTreeMap::new();
        entries.insert("k".to_string(), Value::Float(1.5));
        assert_eq!(Value::Dict(entries).to_string(), "{'k': 1.5}");
        assert_eq!(
            Value::Exception(Exception::new(ExceptionKind::ValueError, "boom")).repr(),
            "ValueError('boom')"
        );
        assert_eq!(
            Value::Builtin(Builtin::Function(BuiltinFunction::Len)).to_string(),
            "<built-in function len>"
        );
    }

    #[test]
    fn test_float_format() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(2.5), "2.5");
        assert_eq!(format_float(-3.0), "-3.0");
        assert_eq!(format_float(1e20), "1e+20");
        assert_eq!(format_float(1e-5), "1e-05");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }

    #[test]
    fn test_numeric_equality_crosses_types() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Bool(true), Value::Int(1));
        assert_ne!(Value::Int(1), Value::Str("1".into()));
        assert_ne!(Value::None, Value::Bool(false));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(Value::List(vec![Value::None]).is_truthy());
        assert!(Value::Float(0.5).is_truthy());
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!({"id": 5, "name": "x", "tags": [true, null]});
        let value = Value::from(json);
        assert_eq!(
            value.to_string(),
            "{'id': 5, 'name': 'x', 'tags': [True, None]}"
        );
    }
}
