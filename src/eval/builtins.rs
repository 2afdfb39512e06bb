//! The capability table: every builtin name a snippet can resolve, plus the
//! methods of the built-in container types.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use lazy_static::lazy_static;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::debug;

use super::context::ExecutionContext;
use super::evaluator::{EvalError, EvalResult, Exception, ExceptionKind};
use super::expression::within_nesting_limit;
use super::operators::{binary_op, compare};
use super::pending::Pending;
use super::value::{format_float, Value};
use crate::ast::BinaryOperator;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum BuiltinFunction {
    Print,
    Len,
    Str,
    Repr,
    Int,
    Float,
    Bool,
    Type,
    Abs,
    Min,
    Max,
    Sum,
    Range,
    Sorted,
    List,
    Dict,
    Round,
    Globals,
    Commit,
    Sleep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Function(BuiltinFunction),
    /// Exception constructor, e.g. `ValueError("boom")`.
    Exception(ExceptionKind),
}

impl Builtin {
    pub fn name(&self) -> String {
        match self {
            Builtin::Function(function) => function.to_string(),
            Builtin::Exception(kind) => kind.to_string(),
        }
    }
}

/// Evaluated call arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    pub positional: Vec<Value>,
    pub named: BTreeMap<String, Value>,
}

impl Arguments {
    pub fn new(positional: Vec<Value>) -> Self {
        Self {
            positional,
            named: BTreeMap::new(),
        }
    }

    pub fn with_named(mut self, name: impl Into<String>, value: Value) -> Self {
        self.named.insert(name.into(), value);
        self
    }

    /// Fails unless between `min` and `max` positional arguments were given.
    pub fn expect_positional(&self, function: &str, min: usize, max: usize) -> EvalResult<()> {
        let given = self.positional.len();
        if given < min || given > max {
            let expected = if min == max {
                format!("exactly {}", min)
            } else if given < min {
                format!("at least {}", min)
            } else {
                format!("at most {}", max)
            };
            return Err(EvalError::Type(format!(
                "{}() takes {} argument{} ({} given)",
                function,
                expected,
                if min == max && min == 1 { "" } else { "s" },
                given
            )));
        }
        Ok(())
    }

    /// Fails on any keyword argument not listed in `allowed`.
    pub fn allow_named(&self, function: &str, allowed: &[&str]) -> EvalResult<()> {
        match self.named.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(name) => Err(EvalError::Type(format!(
                "{}() got an unexpected keyword argument '{}'",
                function, name
            ))),
            None => Ok(()),
        }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn named(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    pub fn str_arg(&self, function: &str, index: usize) -> EvalResult<String> {
        match self.get(index) {
            Some(Value::Str(s)) => Ok(s.clone()),
            Some(other) => Err(EvalError::Type(format!(
                "{}() argument {} must be str, not {}",
                function,
                index + 1,
                other.type_name()
            ))),
            None => Err(EvalError::Type(format!(
                "{}() missing required argument {}",
                function,
                index + 1
            ))),
        }
    }
}

/// Names a snippet may resolve besides its own locals and the namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityTable {
    entries: BTreeMap<String, Builtin>,
}

lazy_static! {
    pub static ref STANDARD_CAPABILITIES: Arc<CapabilityTable> =
        Arc::new(CapabilityTable::standard());
}

impl CapabilityTable {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Every builtin function and every exception constructor.
    pub fn standard() -> Self {
        let functions = BuiltinFunction::iter().map(Builtin::Function);
        let exceptions = ExceptionKind::iter().map(Builtin::Exception);
        Self {
            entries: functions
                .chain(exceptions)
                .map(|builtin| (builtin.name(), builtin))
                .collect(),
        }
    }

    pub fn with(mut self, builtin: Builtin) -> Self {
        self.entries.insert(builtin.name(), builtin);
        self
    }

    /// Drops the listed names; unknown names are ignored with a debug log.
    pub fn without<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        for name in names {
            if self.entries.remove(name.as_ref()).is_none() {
                debug!(name = name.as_ref(), "disabled builtin is not in the table");
            }
        }
        self
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.entries.get(name).copied().map(Value::Builtin)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Calls a builtin. Only `sleep` suspends, and it does so by returning a
/// pending value rather than awaiting here.
pub fn call_builtin(
    builtin: Builtin,
    args: Arguments,
    context: &ExecutionContext,
) -> EvalResult<Value> {
    let function = match builtin {
        Builtin::Exception(kind) => return construct_exception(kind, args),
        Builtin::Function(function) => function,
    };
    let name = function.as_ref();
    if function != BuiltinFunction::Print && function != BuiltinFunction::Sorted {
        args.allow_named(name, &[])?;
    }

    match function {
        BuiltinFunction::Print => print(args, context),
        BuiltinFunction::Len => {
            args.expect_positional(name, 1, 1)?;
            len(&args.positional[0])
        }
        BuiltinFunction::Str => {
            args.expect_positional(name, 0, 1)?;
            Ok(Value::Str(
                args.get(0).map(Value::to_string).unwrap_or_default(),
            ))
        }
        BuiltinFunction::Repr => {
            args.expect_positional(name, 1, 1)?;
            Ok(Value::Str(args.positional[0].repr()))
        }
        BuiltinFunction::Int => {
            args.expect_positional(name, 0, 1)?;
            to_int(args.get(0).unwrap_or(&Value::Int(0)))
        }
        BuiltinFunction::Float => {
            args.expect_positional(name, 0, 1)?;
            to_float(args.get(0).unwrap_or(&Value::Float(0.0)))
        }
        BuiltinFunction::Bool => {
            args.expect_positional(name, 0, 1)?;
            Ok(Value::Bool(args.get(0).is_some_and(Value::is_truthy)))
        }
        BuiltinFunction::Type => {
            args.expect_positional(name, 1, 1)?;
            Ok(match &args.positional[0] {
                Value::Exception(e) => Value::Builtin(Builtin::Exception(e.kind)),
                other => Value::Str(format!("<class '{}'>", other.type_name())),
            })
        }
        BuiltinFunction::Abs => {
            args.expect_positional(name, 1, 1)?;
            abs(&args.positional[0])
        }
        BuiltinFunction::Min => extremum(name, args, Ordering::Less),
        BuiltinFunction::Max => extremum(name, args, Ordering::Greater),
        BuiltinFunction::Sum => {
            args.expect_positional(name, 1, 2)?;
            let mut total = args.get(1).cloned().unwrap_or(Value::Int(0));
            for item in iterate(&args.positional[0])? {
                total = binary_op(BinaryOperator::Add, &total, &item)?;
            }
            Ok(total)
        }
        BuiltinFunction::Range => range(args),
        BuiltinFunction::Sorted => {
            args.expect_positional(name, 1, 1)?;
            args.allow_named(name, &["reverse"])?;
            let mut items = iterate(&args.positional[0])?;
            sort_values(&mut items)?;
            if args.named("reverse").is_some_and(Value::is_truthy) {
                items.reverse();
            }
            Ok(Value::List(items))
        }
        BuiltinFunction::List => {
            args.expect_positional(name, 0, 1)?;
            match args.get(0) {
                Some(value) => Ok(Value::List(iterate(value)?)),
                None => Ok(Value::List(Vec::new())),
            }
        }
        BuiltinFunction::Dict => {
            args.expect_positional(name, 0, 1)?;
            match args.get(0) {
                Some(Value::Dict(entries)) => Ok(Value::Dict(entries.clone())),
                Some(other) => Err(EvalError::Type(format!(
                    "'{}' object is not a mapping",
                    other.type_name()
                ))),
                None => Ok(Value::Dict(BTreeMap::new())),
            }
        }
        BuiltinFunction::Round => {
            args.expect_positional(name, 1, 2)?;
            round(&args.positional[0], args.get(1))
        }
        BuiltinFunction::Globals => {
            args.expect_positional(name, 0, 0)?;
            within_nesting_limit(Value::Dict(context.globals_view()))
        }
        BuiltinFunction::Commit => {
            args.expect_positional(name, 2, 2)?;
            let key = args.str_arg(name, 0)?;
            context.commit(&key, args.positional[1].clone());
            Ok(Value::None)
        }
        BuiltinFunction::Sleep => {
            args.expect_positional(name, 1, 1)?;
            let seconds = args.positional[0].as_float().ok_or_else(|| {
                EvalError::Type(format!(
                    "'{}' object cannot be interpreted as a number",
                    args.positional[0].type_name()
                ))
            })?;
            if seconds.is_nan() || seconds < 0.0 {
                return Err(EvalError::Value(
                    "sleep length must be non-negative".to_string(),
                ));
            }
            let duration = Duration::try_from_secs_f64(seconds).map_err(|_| {
                EvalError::Overflow("sleep length is too large".to_string())
            })?;
            Ok(Value::Pending(Pending::new(
                format!("sleep({})", format_float(seconds)),
                async move {
                    tokio::time::sleep(duration).await;
                    Ok(Value::None)
                },
            )))
        }
    }
}

fn construct_exception(kind: ExceptionKind, args: Arguments) -> EvalResult<Value> {
    args.allow_named(kind.as_ref(), &[])?;
    let message = match args.positional.as_slice() {
        [] => String::new(),
        [single] => single.to_string(),
        many => Value::List(many.to_vec()).to_string(),
    };
    Ok(Value::Exception(Exception::new(kind, message)))
}

fn print(args: Arguments, context: &ExecutionContext) -> EvalResult<Value> {
    args.allow_named("print", &["sep", "end"])?;
    let separator = optional_str(&args, "sep", " ")?;
    let end = optional_str(&args, "end", "\n")?;
    let text = args
        .positional
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(&separator);
    context.print(&format!("{}{}", text, end));
    Ok(Value::None)
}

fn optional_str(args: &Arguments, name: &str, default: &str) -> EvalResult<String> {
    match args.named(name) {
        None | Some(Value::None) => Ok(default.to_string()),
        Some(Value::Str(s)) => Ok(s.clone()),
        Some(other) => Err(EvalError::Type(format!(
            "{} must be None or a string, not {}",
            name,
            other.type_name()
        ))),
    }
}

fn len(value: &Value) -> EvalResult<Value> {
    let length = match value {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Dict(entries) => entries.len(),
        other => {
            return Err(EvalError::Type(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    };
    Ok(Value::Int(length as i64))
}

fn to_int(value: &Value) -> EvalResult<Value> {
    match value {
        Value::Float(f) if f.is_nan() => Err(EvalError::Value(
            "cannot convert float NaN to integer".to_string(),
        )),
        Value::Float(f) if f.is_infinite() => Err(EvalError::Overflow(
            "cannot convert float infinity to integer".to_string(),
        )),
        Value::Float(f) => {
            let truncated = f.trunc();
            if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
                return Err(EvalError::Overflow("int too large to convert".to_string()));
            }
            Ok(Value::Int(truncated as i64))
        }
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| {
                EvalError::Value(format!(
                    "invalid literal for int() with base 10: {}",
                    value.repr()
                ))
            }),
        other => other.as_int().map(Value::Int).ok_or_else(|| {
            EvalError::Type(format!(
                "int() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

fn to_float(value: &Value) -> EvalResult<Value> {
    match value {
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| {
                EvalError::Value(format!(
                    "could not convert string to float: {}",
                    value.repr()
                ))
            }),
        other => other.as_float().map(Value::Float).ok_or_else(|| {
            EvalError::Type(format!(
                "float() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

fn abs(value: &Value) -> EvalResult<Value> {
    match value {
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => match other.as_int() {
            Some(i) => i
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| EvalError::Overflow("integer overflow".to_string())),
            None => Err(EvalError::Type(format!(
                "bad operand type for abs(): '{}'",
                other.type_name()
            ))),
        },
    }
}

fn extremum(name: &str, args: Arguments, wanted: Ordering) -> EvalResult<Value> {
    let candidates = match args.positional.as_slice() {
        [] => {
            return Err(EvalError::Type(format!(
                "{} expected at least 1 argument, got 0",
                name
            )))
        }
        [single] => iterate(single)?,
        many => many.to_vec(),
    };
    let mut best: Option<Value> = None;
    for candidate in candidates {
        best = match best {
            None => Some(candidate),
            Some(current) => {
                if compare(&candidate, &current)? == wanted {
                    Some(candidate)
                } else {
                    Some(current)
                }
            }
        };
    }
    best.ok_or_else(|| EvalError::Value(format!("{}() arg is an empty sequence", name)))
}

fn int_arg(value: &Value) -> EvalResult<i64> {
    value.as_int().ok_or_else(|| {
        EvalError::Type(format!(
            "'{}' object cannot be interpreted as an integer",
            value.type_name()
        ))
    })
}

fn range(args: Arguments) -> EvalResult<Value> {
    args.expect_positional("range", 1, 3)?;
    let numbers = args
        .positional
        .iter()
        .map(int_arg)
        .collect::<EvalResult<Vec<_>>>()?;
    let (start, stop, step) = match numbers.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(EvalError::Type("range expected 1 to 3 arguments".to_string())),
    };
    if step == 0 {
        return Err(EvalError::Value("range() arg 3 must not be zero".to_string()));
    }
    let mut items = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        items.push(Value::Int(current));
        current = match current.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(Value::List(items))
}

fn round_half_even(x: f64) -> f64 {
    let rounded = x.round();
    if (x - x.trunc()).abs() == 0.5 {
        2.0 * (x / 2.0).round()
    } else {
        rounded
    }
}

fn round(value: &Value, digits: Option<&Value>) -> EvalResult<Value> {
    let digits = match digits {
        None | Some(Value::None) => None,
        Some(other) => Some(int_arg(other)?),
    };
    match (value, digits) {
        (Value::Float(f), None) => to_int(&Value::Float(round_half_even(*f))),
        (Value::Float(f), Some(n)) => {
            let exponent = i32::try_from(n).unwrap_or(if n < 0 { i32::MIN } else { i32::MAX });
            let scale = 10f64.powi(exponent);
            if !scale.is_finite() || scale == 0.0 {
                return Ok(Value::Float(*f));
            }
            Ok(Value::Float(round_half_even(f * scale) / scale))
        }
        (other, _) => other.as_int().map(Value::Int).ok_or_else(|| {
            EvalError::Type(format!(
                "type {} doesn't define __round__ method",
                other.type_name()
            ))
        }),
    }
}

/// Sorts in place, failing on the first pair that cannot be ordered.
pub fn sort_values(items: &mut [Value]) -> EvalResult<()> {
    let mut failure = None;
    items.sort_by(|a, b| match compare(a, b) {
        Ok(ordering) => ordering,
        Err(e) => {
            failure.get_or_insert(e);
            Ordering::Equal
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Items produced by iterating `value`: characters of a string, elements of
/// a list, keys of a dict.
pub fn iterate(value: &Value) -> EvalResult<Vec<Value>> {
    match value {
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        Value::List(items) => Ok(items.clone()),
        Value::Dict(entries) => Ok(entries.keys().cloned().map(Value::Str).collect()),
        other => Err(EvalError::Type(format!(
            "'{}' object is not iterable",
            other.type_name()
        ))),
    }
}

const STR_METHODS: &[&str] = &[
    "upper",
    "lower",
    "strip",
    "lstrip",
    "rstrip",
    "split",
    "join",
    "replace",
    "startswith",
    "endswith",
    "find",
    "count",
];
const LIST_METHODS: &[&str] = &["index", "count", "copy"];
const DICT_METHODS: &[&str] = &["keys", "values", "items", "get"];

/// Whether `receiver.name` is a built-in method.
pub fn has_method(receiver: &Value, name: &str) -> bool {
    match receiver {
        Value::Str(_) => STR_METHODS.contains(&name),
        Value::List(_) => LIST_METHODS.contains(&name),
        Value::Dict(_) => DICT_METHODS.contains(&name),
        Value::Object(object) => object.has_method(name),
        _ => false,
    }
}

pub fn call_method(receiver: &Value, name: &str, args: Arguments) -> EvalResult<Value> {
    match receiver {
        Value::Object(object) => object.call_method(name, args),
        Value::Str(s) => {
            args.allow_named(name, &[])?;
            str_method(s, name, &args)
        }
        Value::List(items) => {
            args.allow_named(name, &[])?;
            list_method(items, name, &args)
        }
        Value::Dict(entries) => {
            args.allow_named(name, &[])?;
            dict_method(entries, name, &args)
        }
        other => Err(no_attribute(other, name)),
    }
}

pub fn no_attribute(receiver: &Value, name: &str) -> EvalError {
    EvalError::Attribute(format!(
        "'{}' object has no attribute '{}'",
        receiver.type_name(),
        name
    ))
}

fn strip_chars(args: &Arguments, name: &str) -> EvalResult<Option<Vec<char>>> {
    args.expect_positional(name, 0, 1)?;
    match args.get(0) {
        None | Some(Value::None) => Ok(None),
        Some(_) => Ok(Some(args.str_arg(name, 0)?.chars().collect())),
    }
}

fn str_method(s: &str, name: &str, args: &Arguments) -> EvalResult<Value> {
    let value = match name {
        "upper" => {
            args.expect_positional(name, 0, 0)?;
            Value::Str(s.to_uppercase())
        }
        "lower" => {
            args.expect_positional(name, 0, 0)?;
            Value::Str(s.to_lowercase())
        }
        "strip" | "lstrip" | "rstrip" => {
            let chars = strip_chars(args, name)?;
            let matches = |c: char| match &chars {
                Some(set) => set.contains(&c),
                None => c.is_whitespace(),
            };
            Value::Str(match name {
                "strip" => s.trim_matches(matches),
                "lstrip" => s.trim_start_matches(matches),
                _ => s.trim_end_matches(matches),
            }
            .to_string())
        }
        "split" => {
            args.expect_positional(name, 0, 2)?;
            let limit = match args.get(1) {
                Some(value) => int_arg(value)?,
                None => -1,
            };
            let parts: Vec<String> = match args.get(0) {
                None | Some(Value::None) => split_whitespace(s, limit),
                Some(_) => {
                    let separator = args.str_arg(name, 0)?;
                    if separator.is_empty() {
                        return Err(EvalError::Value("empty separator".to_string()));
                    }
                    if limit < 0 {
                        s.split(separator.as_str()).map(str::to_string).collect()
                    } else {
                        s.splitn(limit as usize + 1, separator.as_str())
                            .map(str::to_string)
                            .collect()
                    }
                }
            };
            Value::List(parts.into_iter().map(Value::Str).collect())
        }
        "join" => {
            args.expect_positional(name, 1, 1)?;
            let mut parts = Vec::new();
            for (index, item) in iterate(&args.positional[0])?.into_iter().enumerate() {
                match item {
                    Value::Str(part) => parts.push(part),
                    other => {
                        return Err(EvalError::Type(format!(
                            "sequence item {}: expected str instance, {} found",
                            index,
                            other.type_name()
                        )))
                    }
                }
            }
            Value::Str(parts.join(s))
        }
        "replace" => {
            args.expect_positional(name, 2, 2)?;
            let old = args.str_arg(name, 0)?;
            let new = args.str_arg(name, 1)?;
            Value::Str(s.replace(&old, &new))
        }
        "startswith" | "endswith" => {
            args.expect_positional(name, 1, 1)?;
            let affix = args.str_arg(name, 0)?;
            Value::Bool(if name == "startswith" {
                s.starts_with(&affix)
            } else {
                s.ends_with(&affix)
            })
        }
        "find" => {
            args.expect_positional(name, 1, 1)?;
            let needle = args.str_arg(name, 0)?;
            Value::Int(
                s.find(&needle)
                    .map(|byte| s[..byte].chars().count() as i64)
                    .unwrap_or(-1),
            )
        }
        "count" => {
            args.expect_positional(name, 1, 1)?;
            let needle = args.str_arg(name, 0)?;
            let count = if needle.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(needle.as_str()).count()
            };
            Value::Int(count as i64)
        }
        _ => return Err(no_attribute(&Value::Str(s.to_string()), name)),
    };
    Ok(value)
}

fn split_whitespace(s: &str, limit: i64) -> Vec<String> {
    if limit < 0 {
        return s.split_whitespace().map(str::to_string).collect();
    }
    let mut parts = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if parts.len() as i64 == limit {
            parts.push(rest.to_string());
            break;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        parts.push(rest[..end].to_string());
        rest = rest[end..].trim_start();
    }
    parts
}

fn list_method(items: &[Value], name: &str, args: &Arguments) -> EvalResult<Value> {
    match name {
        "index" => {
            args.expect_positional(name, 1, 1)?;
            items
                .iter()
                .position(|item| item == &args.positional[0])
                .map(|i| Value::Int(i as i64))
                .ok_or_else(|| {
                    EvalError::Value(format!("{} is not in list", args.positional[0].repr()))
                })
        }
        "count" => {
            args.expect_positional(name, 1, 1)?;
            let count = items
                .iter()
                .filter(|item| *item == &args.positional[0])
                .count();
            Ok(Value::Int(count as i64))
        }
        "copy" => {
            args.expect_positional(name, 0, 0)?;
            Ok(Value::List(items.to_vec()))
        }
        _ => Err(no_attribute(&Value::List(Vec::new()), name)),
    }
}

fn dict_method(
    entries: &BTreeMap<String, Value>,
    name: &str,
    args: &Arguments,
) -> EvalResult<Value> {
    match name {
        "keys" => {
            args.expect_positional(name, 0, 0)?;
            Ok(Value::List(entries.keys().cloned().map(Value::Str).collect()))
        }
        "values" => {
            args.expect_positional(name, 0, 0)?;
            Ok(Value::List(entries.values().cloned().collect()))
        }
        "items" => {
            args.expect_positional(name, 0, 0)?;
            Ok(Value::List(
                entries
                    .iter()
                    .map(|(k, v)| Value::List(vec![Value::Str(k.clone()), v.clone()]))
                    .collect(),
            ))
        }
        "get" => {
            args.expect_positional(name, 1, 2)?;
            let found = match &args.positional[0] {
                Value::Str(key) => entries.get(key).cloned(),
                _ => None,
            };
            Ok(found.unwrap_or_else(|| args.get(1).cloned().unwrap_or(Value::None)))
        }
        _ => Err(no_attribute(&Value::Dict(BTreeMap::new()), name)),
    }
}
