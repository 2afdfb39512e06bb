//! Awaitable values and the bounded loop that resolves them.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use super::evaluator::{EvalError, EvalResult};
use super::value::Value;

/// A value that is still being computed. Cloning shares the same underlying
/// future, so awaiting it twice yields the same result.
#[derive(Clone)]
pub struct Pending {
    label: String,
    future: Shared<BoxFuture<'static, EvalResult<Value>>>,
}

impl Pending {
    pub fn new<F>(label: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = EvalResult<Value>> + Send + 'static,
    {
        Self {
            label: label.into(),
            future: future.boxed().shared(),
        }
    }

    pub fn ready(label: impl Into<String>, value: Value) -> Self {
        Self::new(label, futures::future::ready(Ok(value)))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether both handles await the same underlying future.
    pub fn same_as(&self, other: &Pending) -> bool {
        self.future.ptr_eq(&other.future)
    }

    pub async fn resolve(&self) -> EvalResult<Value> {
        self.future.clone().await
    }
}

impl fmt::Debug for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending").field("label", &self.label).finish()
    }
}

/// Limits for resolving a chain of pending values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettlePolicy {
    pub timeout: Duration,
    pub max_depth: usize,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(30_000),
            max_depth: 8,
        }
    }
}

/// Awaits `value` until it is no longer pending.
///
/// A pending value may resolve to another pending value; at most
/// `policy.max_depth` of them are followed, and the whole chain shares one
/// deadline.
pub async fn settle(value: Value, policy: &SettlePolicy) -> EvalResult<Value> {
    let deadline = tokio::time::Instant::now() + policy.timeout;
    let mut current = value;
    let mut depth = 0;

    while let Value::Pending(pending) = current {
        if depth >= policy.max_depth {
            return Err(EvalError::Runtime(format!(
                "pending value did not settle after {} awaits",
                depth
            )));
        }
        depth += 1;
        debug!(label = pending.label(), depth, "awaiting pending value");
        current = match tokio::time::timeout_at(deadline, pending.resolve()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(EvalError::Timeout(format!(
                    "{} did not complete within {:?}",
                    pending.label(),
                    policy.timeout
                )))
            }
        };
    }
    Ok(current)
}
