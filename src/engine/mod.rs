//! # Evaluation Engine
//!
//! Entry point for `!eval` and `!exec`. One call goes through:
//!
//! ```text
//! source -> ScopeManager::enter -> CodeSynthesizer -> ExecutionDriver -> Value | Failure
//!                                                        |
//!                                           OutputSink (buffer, !exec only)
//! ```
//!
//! * [`synthesizer`]: source text to a [`synthesizer::SynthesizedUnit`]
//! * [`scope`]: the shared [`scope::Namespace`] and the isolation policy
//! * [`driver`]: invocation, settling of pending values, panic capture

pub mod driver;
pub mod scope;
pub mod synthesizer;

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::eval::{CapabilityTable, ExecutionContext, Failure, OutputSink, Value};
use driver::ExecutionDriver;
use scope::{Isolation, Namespace, ScopeManager};
use synthesizer::{CodeSynthesizer, Mode};

/// Result text of an `!exec` block that printed nothing.
pub const NO_OUTPUT_PLACEHOLDER: &str = "Code executed without output.";

/// Ordered name to value mapping injected into a snippet's frame.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    entries: Vec<(String, Value)>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a binding, replacing an earlier one with the same name in place.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct Engine {
    config: EngineConfig,
    synthesizer: CodeSynthesizer,
    scope: ScopeManager,
    driver: ExecutionDriver,
    capabilities: Arc<CapabilityTable>,
}

impl Engine {
    pub fn new(config: EngineConfig, namespace: Arc<Namespace>) -> Self {
        let capabilities = Arc::new(CapabilityTable::standard().without(&config.disabled_builtins));
        debug!(
            isolation = %config.isolation,
            builtins = capabilities.len(),
            "engine created"
        );
        Self {
            synthesizer: CodeSynthesizer::new(&config.identity),
            scope: ScopeManager::new(namespace, config.isolation),
            driver: ExecutionDriver::new(),
            capabilities,
            config,
        }
    }

    pub fn namespace(&self) -> &Arc<Namespace> {
        self.scope.namespace()
    }

    pub fn isolation(&self) -> Isolation {
        self.scope.isolation()
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluates `source` in expression mode. The trailing expression, if
    /// any, is the result; `print` goes to the log.
    #[tracing::instrument(
        level = "debug",
        skip(self, source, bindings),
        fields(eval_id = %Uuid::new_v4(), mode = "expression")
    )]
    pub async fn evaluate(&self, source: &str, bindings: &Bindings) -> Result<Value, Failure> {
        let context = self.context(OutputSink::log());
        let guard = self.scope.enter(context.clone(), true).await;

        let names: Vec<&str> = bindings.names().collect();
        let unit = self
            .synthesizer
            .synthesize(source, &names, Mode::Expression)?;
        let result = self.driver.run(&unit, bindings, context).await;

        drop(guard);
        if let Err(failure) = &result {
            info!(category = %failure.category, "evaluation failed");
        }
        result
    }

    /// Runs `source` as a block with the client as `c` and the message as
    /// `m`. The result is whatever the block printed.
    #[tracing::instrument(
        level = "debug",
        skip(self, source, client, message),
        fields(eval_id = %Uuid::new_v4(), mode = "block")
    )]
    pub async fn execute(
        &self,
        source: &str,
        client: Value,
        message: Value,
    ) -> Result<String, Failure> {
        let bindings = Bindings::new().with("c", client).with("m", message);
        let context = self.context(OutputSink::buffer());
        let guard = self.scope.enter(context.clone(), false).await;
        if self.isolation() != Isolation::Frame {
            // one-way, and only once the gate is held
            context.merge_into_namespace(bindings.iter().cloned());
        }

        let unit = self
            .synthesizer
            .synthesize(source, &["c", "m"], Mode::Block)?;
        let result = self.driver.run(&unit, &bindings, context.clone()).await;
        drop(guard);

        match result {
            Ok(_) => {
                let output = context.output().contents();
                if output.is_empty() {
                    Ok(NO_OUTPUT_PLACEHOLDER.to_string())
                } else {
                    Ok(output)
                }
            }
            Err(failure) => {
                context.output().clear();
                info!(category = %failure.category, "block failed");
                Err(failure)
            }
        }
    }

    fn context(&self, output: OutputSink) -> Arc<ExecutionContext> {
        Arc::new(
            ExecutionContext::new(self.namespace().clone(), self.capabilities.clone())
                .with_isolation(self.isolation())
                .with_output(Arc::new(output))
                .with_settle(self.config.settle_policy()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::FailureKind;
    use pretty_assertions::assert_eq;

    fn engine(isolation: Isolation) -> Engine {
        Engine::new(
            EngineConfig {
                isolation,
                ..EngineConfig::default()
            },
            Arc::new(Namespace::new()),
        )
    }

    #[test]
    fn test_bindings_keep_order_and_replace() {
        let mut bindings = Bindings::new().with("m", Value::Int(1)).with("c", Value::Int(2));
        bindings.insert("m", Value::Int(3));
        assert_eq!(bindings.names().collect::<Vec<_>>(), vec!["m", "c"]);
        assert_eq!(bindings.get("m"), Some(&Value::Int(3)));
        assert_eq!(bindings.len(), 2);
    }

    #[tokio::test]
    async fn test_evaluate() {
        let engine = engine(Isolation::Frame);
        let bindings = Bindings::new().with("n", Value::Int(4));
        assert_eq!(engine.evaluate("n * 2", &bindings).await.unwrap(), Value::Int(8));
        assert_eq!(
            engine.evaluate("x = 5", &Bindings::new()).await.unwrap(),
            Value::None
        );
    }

    #[tokio::test]
    async fn test_execute_output() {
        let engine = engine(Isolation::Frame);
        assert_eq!(
            engine
                .execute("print('hi')", Value::None, Value::None)
                .await
                .unwrap(),
            "hi\n"
        );
        assert_eq!(
            engine.execute("x = 1", Value::None, Value::None).await.unwrap(),
            NO_OUTPUT_PLACEHOLDER
        );
    }

    #[tokio::test]
    async fn test_execute_failure_discards_output() {
        let engine = engine(Isolation::Frame);
        let failure = engine
            .execute("print('partial')\nraise ValueError('boom')", Value::None, Value::None)
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Runtime);
        let diagnostic = failure.diagnostic();
        assert!(diagnostic.contains("ValueError: boom"));
        assert!(!diagnostic.contains("partial"));
    }

    #[tokio::test]
    async fn test_execute_bindings_leak_only_in_legacy_modes() {
        let frame = engine(Isolation::Frame);
        frame.execute("pass", Value::Int(1), Value::Int(2)).await.unwrap();
        assert!(frame.namespace().is_empty());

        let legacy = engine(Isolation::Snapshot);
        legacy.execute("pass", Value::Int(1), Value::Int(2)).await.unwrap();
        assert_eq!(legacy.namespace().get("m"), Some(Value::Int(2)));
    }

    #[tokio::test]
    async fn test_disabled_builtins() {
        let engine = Engine::new(
            EngineConfig {
                disabled_builtins: vec!["sleep".to_string()],
                ..EngineConfig::default()
            },
            Arc::new(Namespace::new()),
        );
        assert!(!engine.capabilities().contains("sleep"));
        let failure = engine
            .evaluate("sleep(0)", &Bindings::new())
            .await
            .unwrap_err();
        assert_eq!(failure.category, "NameError");
    }
}
