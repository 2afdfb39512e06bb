use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, warn};

use super::synthesizer::SynthesizedUnit;
use super::Bindings;
use crate::eval::{
    settle, EvalError, EvalResult, Evaluator, ExecutionContext, Failure, TraceFrame, Value,
};

/// Invokes synthesized units and drives their results to a settled value.
#[derive(Default)]
pub struct ExecutionDriver {
    evaluator: Evaluator,
}

impl ExecutionDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `unit` in `context`. Nothing escapes as a panic: host-object
    /// panics are caught here and reported as `SystemError`.
    pub async fn run(
        &self,
        unit: &SynthesizedUnit,
        bindings: &Bindings,
        context: Arc<ExecutionContext>,
    ) -> Result<Value, Failure> {
        let outcome = AssertUnwindSafe(self.invoke(unit, bindings, context.clone()))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                warn!(unit = %unit.name, %message, "snippet panicked");
                Err(EvalError::Panic(message))
            });

        outcome.map_err(|err| {
            debug!(unit = %unit.name, line = context.line(), %err, "unit failed");
            Failure::runtime(
                &err,
                vec![TraceFrame::at(
                    &unit.source,
                    context.line(),
                    Some(unit.name.clone()),
                )],
            )
        })
    }

    async fn invoke(
        &self,
        unit: &SynthesizedUnit,
        bindings: &Bindings,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        for (name, value) in unit.bind(bindings)? {
            context.assign(name, value);
        }
        let value = self.evaluator.eval_unit(&unit.body, context.clone()).await?;
        settle(value, context.settle_policy()).await
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "host object panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdentityConfig;
    use crate::engine::scope::Namespace;
    use crate::engine::synthesizer::{CodeSynthesizer, Mode};
    use crate::eval::builtins::STANDARD_CAPABILITIES;
    use crate::eval::{Arguments, FailureKind, HostObject, Pending, SettlePolicy};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    struct Grenade;

    impl HostObject for Grenade {
        fn type_name(&self) -> &str {
            "Grenade"
        }

        fn attribute(&self, _name: &str) -> Option<Value> {
            None
        }

        fn has_method(&self, name: &str) -> bool {
            name == "pull" || name == "later"
        }

        fn call_method(&self, name: &str, _args: Arguments) -> EvalResult<Value> {
            match name {
                "pull" => panic!("pin pulled"),
                _ => Ok(Value::Pending(Pending::ready(
                    "later",
                    Value::Pending(Pending::ready("inner", Value::Int(3))),
                ))),
            }
        }
    }

    fn context() -> Arc<ExecutionContext> {
        Arc::new(ExecutionContext::new(
            Arc::new(Namespace::new()),
            STANDARD_CAPABILITIES.clone(),
        ))
    }

    async fn run(source: &str, bindings: Bindings) -> Result<Value, Failure> {
        let names: Vec<&str> = bindings.names().collect();
        let unit = CodeSynthesizer::new(&IdentityConfig::default())
            .synthesize(source, &names, Mode::Expression)?;
        ExecutionDriver::new().run(&unit, &bindings, context()).await
    }

    #[tokio::test]
    async fn test_runs_expression() {
        assert_eq!(run("1 + 1", Bindings::new()).await.unwrap(), Value::Int(2));
        assert_eq!(
            run("__name__", Bindings::new()).await.unwrap(),
            Value::from("admin_eval.plugins.sudo")
        );
    }

    #[tokio::test]
    async fn test_settles_returned_pending_value() {
        let bindings = Bindings::new().with("g", Value::Object(Arc::new(Grenade)));
        assert_eq!(run("g.later()", bindings).await.unwrap(), Value::Int(3));
    }

    #[tokio::test]
    async fn test_runtime_failure_points_at_line() {
        let failure = run("x = 1\ny = x / 0\ny", Bindings::new())
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Runtime);
        assert_eq!(failure.category, "ZeroDivisionError");
        assert_eq!(failure.trace[0].line, 2);
        assert_eq!(failure.trace[0].unit.as_deref(), Some("_snippet"));
        assert_eq!(failure.trace[0].source.as_deref(), Some("y = x / 0"));
    }

    #[tokio::test]
    async fn test_panics_become_failures() {
        let bindings = Bindings::new().with("g", Value::Object(Arc::new(Grenade)));
        let failure = run("g.pull()", bindings).await.unwrap_err();
        assert_eq!(failure.category, "SystemError");
        assert_eq!(failure.message, "pin pulled");
    }

    #[tokio::test]
    async fn test_await_timeout() {
        let unit = CodeSynthesizer::new(&IdentityConfig::default())
            .synthesize("sleep(5)", &[], Mode::Expression)
            .unwrap();
        let context = Arc::new(
            ExecutionContext::new(Arc::new(Namespace::new()), STANDARD_CAPABILITIES.clone())
                .with_settle(SettlePolicy {
                    timeout: Duration::from_millis(10),
                    max_depth: 8,
                }),
        );
        let failure = ExecutionDriver::new()
            .run(&unit, &Bindings::new(), context)
            .await
            .unwrap_err();
        assert_eq!(failure.category, "TimeoutError");
    }
}
