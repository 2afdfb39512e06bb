use std::sync::Arc;

use async_recursion::async_recursion;

use super::builtins::{iterate, Builtin};
use super::context::ExecutionContext;
use super::evaluator::{EvalError, EvalResult, Exception};
use super::expression::{get_item, set_item, ExpressionEvaluator};
use super::operators::binary_op;
use super::value::Value;
use crate::ast::{AssignTarget, Expression, Statement, StatementKind, Statements};

/// Outcome of evaluating one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementResult {
    /// Statement completed normally (the value is the expression's value for
    /// expression statements, `None` otherwise).
    Value(Value),

    /// Control leaves the enclosing block.
    Control(ControlFlow),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlFlow {
    Break,
    Continue,
    Return(Value),
}

pub struct StatementEvaluator {
    pub expression_evaluator: Arc<ExpressionEvaluator>,
}

impl Default for StatementEvaluator {
    fn default() -> Self {
        Self {
            expression_evaluator: Arc::new(ExpressionEvaluator::new()),
        }
    }
}

impl StatementEvaluator {
    pub fn new(expression_evaluator: Arc<ExpressionEvaluator>) -> Self {
        Self {
            expression_evaluator,
        }
    }

    #[async_recursion]
    pub async fn eval_statement(
        &self,
        statement: &Statement,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<StatementResult> {
        let _depth = context.descend()?;
        context.set_line(statement.line);
        match &statement.kind {
            StatementKind::Expression(expr) => Ok(StatementResult::Value(
                self.eval_expression(expr, context).await?,
            )),
            StatementKind::Assignment { target, value } => {
                let value = self.eval_expression(value, context.clone()).await?;
                self.assign(target, value, context).await?;
                Ok(StatementResult::Value(Value::None))
            }
            StatementKind::AugAssignment { target, op, value } => {
                let current = match target {
                    AssignTarget::Name(name) => context.lookup(name)?,
                    AssignTarget::Index { object, index } => {
                        let container = self.eval_expression(object, context.clone()).await?;
                        let key = self.eval_expression(index, context.clone()).await?;
                        get_item(&container, &key)?
                    }
                };
                let operand = self.eval_expression(value, context.clone()).await?;
                let updated = binary_op(*op, &current, &operand)?;
                self.assign(target, updated, context).await?;
                Ok(StatementResult::Value(Value::None))
            }
            StatementKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval_expression(expr, context).await?,
                    None => Value::None,
                };
                Ok(StatementResult::Control(ControlFlow::Return(value)))
            }
            StatementKind::Raise(expr) => {
                let value = self.eval_expression(expr, context).await?;
                Err(match value {
                    Value::Exception(exception) => EvalError::Raised(exception),
                    Value::Builtin(Builtin::Exception(kind)) => {
                        EvalError::Raised(Exception::new(kind, ""))
                    }
                    _ => EvalError::Type("exceptions must derive from BaseException".to_string()),
                })
            }
            StatementKind::If {
                branches,
                else_block,
            } => {
                for (condition, block) in branches {
                    if self
                        .eval_expression(condition, context.clone())
                        .await?
                        .is_truthy()
                    {
                        return self.eval_block(block, context).await;
                    }
                }
                match else_block {
                    Some(block) => self.eval_block(block, context).await,
                    None => Ok(StatementResult::Value(Value::None)),
                }
            }
            StatementKind::While { condition, body } => {
                while self
                    .eval_expression(condition, context.clone())
                    .await?
                    .is_truthy()
                {
                    match self.eval_block(body, context.clone()).await? {
                        StatementResult::Control(ControlFlow::Break) => break,
                        StatementResult::Control(ControlFlow::Return(value)) => {
                            return Ok(StatementResult::Control(ControlFlow::Return(value)))
                        }
                        _ => {}
                    }
                }
                Ok(StatementResult::Value(Value::None))
            }
            StatementKind::For {
                variable,
                iterable,
                body,
            } => {
                let items = iterate(&self.eval_expression(iterable, context.clone()).await?)?;
                for item in items {
                    context.assign(variable.clone(), item);
                    match self.eval_block(body, context.clone()).await? {
                        StatementResult::Control(ControlFlow::Break) => break,
                        StatementResult::Control(ControlFlow::Return(value)) => {
                            return Ok(StatementResult::Control(ControlFlow::Return(value)))
                        }
                        _ => {}
                    }
                }
                Ok(StatementResult::Value(Value::None))
            }
            StatementKind::Break => Ok(StatementResult::Control(ControlFlow::Break)),
            StatementKind::Continue => Ok(StatementResult::Control(ControlFlow::Continue)),
            StatementKind::Pass => Ok(StatementResult::Value(Value::None)),
            StatementKind::MergeIdentity { binding } => match context.lookup(binding)? {
                Value::Dict(entries) => {
                    context.merge_identity(entries);
                    Ok(StatementResult::Value(Value::None))
                }
                other => Err(EvalError::Type(format!(
                    "identity binding must be a dict, not {}",
                    other.type_name()
                ))),
            },
        }
    }

    /// Runs statements in order, stopping at the first control transfer.
    pub async fn eval_block(
        &self,
        statements: &Statements,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<StatementResult> {
        let mut last = StatementResult::Value(Value::None);
        for statement in statements {
            last = self.eval_statement(statement, context.clone()).await?;
            if matches!(last, StatementResult::Control(_)) {
                break;
            }
        }
        Ok(last)
    }

    pub async fn eval_expression(
        &self,
        expr: &Expression,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<Value> {
        self.expression_evaluator
            .eval_expression(expr, context)
            .await
    }

    async fn assign(
        &self,
        target: &AssignTarget,
        value: Value,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<()> {
        match target {
            AssignTarget::Name(name) => {
                context.assign(name.clone(), value);
                Ok(())
            }
            AssignTarget::Index { object, index } => {
                let key = self.eval_expression(index, context.clone()).await?;
                self.store_item(object, key, value, context).await
            }
        }
    }

    /// Writes `value` into `object[key]` and stores the updated container
    /// back where `object` came from. Containers are values, so a nested
    /// target like `a[0][1]` rewrites each level on the way out.
    #[async_recursion]
    async fn store_item(
        &self,
        object: &Expression,
        key: Value,
        value: Value,
        context: Arc<ExecutionContext>,
    ) -> EvalResult<()> {
        let _depth = context.descend()?;
        let container = self.eval_expression(object, context.clone()).await?;
        let updated = set_item(container, &key, value)?;
        match object {
            Expression::Variable(name) => {
                context.assign(name.clone(), updated);
                Ok(())
            }
            Expression::Index {
                object: outer,
                index: outer_index,
            } => {
                let outer_key = self.eval_expression(outer_index, context.clone()).await?;
                self.store_item(outer, outer_key, updated, context).await
            }
            _ => Err(EvalError::Syntax(
                "cannot assign into a temporary value".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::parse_snippet;
    use crate::engine::scope::Namespace;
    use crate::eval::builtins::STANDARD_CAPABILITIES;
    use crate::eval::evaluator::ExceptionKind;
    use crate::eval::output::OutputSink;
    use crate::tokenizer::Tokenizer;
    use pretty_assertions::assert_eq;

    fn setup_context() -> Arc<ExecutionContext> {
        Arc::new(
            ExecutionContext::new(Arc::new(Namespace::new()), STANDARD_CAPABILITIES.clone())
                .with_output(Arc::new(OutputSink::buffer())),
        )
    }

    async fn run(source: &str, context: Arc<ExecutionContext>) -> EvalResult<StatementResult> {
        let spans = Tokenizer::new().tokenize(source).unwrap();
        let statements = parse_snippet(&spans).unwrap();
        StatementEvaluator::default()
            .eval_block(&statements, context)
            .await
    }

    #[tokio::test]
    async fn test_assignment_and_expression() {
        let context = setup_context();
        let result = run("x = 5\nx * 2\n", context.clone()).await.unwrap();
        assert_eq!(result, StatementResult::Value(Value::Int(10)));
        assert_eq!(context.lookup("x").unwrap(), Value::Int(5));
    }

    #[tokio::test]
    async fn test_augmented_assignment() {
        let context = setup_context();
        run("x = 1\nx += 2\nx *= 3\n", context.clone()).await.unwrap();
        assert_eq!(context.lookup("x").unwrap(), Value::Int(9));
    }

    #[tokio::test]
    async fn test_nested_item_assignment() {
        let context = setup_context();
        run(
            "grid = [[0, 0], [0, 0]]\ngrid[1][0] = 7\nd = {}\nd['k'] = 'v'\nd['k'] += '!'\n",
            context.clone(),
        )
        .await
        .unwrap();
        assert_eq!(
            context.lookup("grid").unwrap().to_string(),
            "[[0, 0], [7, 0]]"
        );
        assert_eq!(context.lookup("d").unwrap().to_string(), "{'k': 'v!'}");
    }

    #[tokio::test]
    async fn test_control_flow() {
        let context = setup_context();
        let source = "\
total = 0
for i in range(10):
    if i % 2 == 0:
        continue
    elif i > 7:
        break
    total += i
n = 0
while True:
    n += 1
    if n >= 3:
        break
";
        run(source, context.clone()).await.unwrap();
        assert_eq!(context.lookup("total").unwrap(), Value::Int(1 + 3 + 5 + 7));
        assert_eq!(context.lookup("n").unwrap(), Value::Int(3));
    }

    #[tokio::test]
    async fn test_return_leaves_loops() {
        let result = run(
            "for x in [1, 2, 3]:\n    if x == 2:\n        return x * 10\n",
            setup_context(),
        )
        .await
        .unwrap();
        assert_eq!(
            result,
            StatementResult::Control(ControlFlow::Return(Value::Int(20)))
        );
    }

    #[tokio::test]
    async fn test_raise() {
        let context = setup_context();
        let err = run("x = 1\nraise ValueError('boom')\n", context.clone())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EvalError::Raised(Exception::new(ExceptionKind::ValueError, "boom"))
        );
        assert_eq!(context.line(), 2);

        let err = run("raise KeyError", setup_context()).await.unwrap_err();
        assert_eq!(err.kind(), ExceptionKind::KeyError);

        let err = run("raise 5", setup_context()).await.unwrap_err();
        assert!(matches!(err, EvalError::Type(_)));
    }

    #[tokio::test]
    async fn test_long_index_chain_assignment_fails_cleanly() {
        let source = format!("x = [0]\nx{} = 1\n", "[0]".repeat(5000));
        let err = run(&source, setup_context()).await.unwrap_err();
        assert_eq!(err.to_string(), "'int' object is not subscriptable");
    }

    #[tokio::test]
    async fn test_values_cannot_nest_without_bound() {
        let context = setup_context();
        let err = run("x = []\nwhile True:\n    x = [x]\n", context.clone())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ExceptionKind::RecursionError);
        assert_eq!(err.to_string(), "maximum nesting depth exceeded");

        let err = run("d = {}\nwhile True:\n    d['k'] = d\n", setup_context())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ExceptionKind::RecursionError);
    }

    #[tokio::test]
    async fn test_print_goes_to_sink() {
        let context = setup_context();
        run("for c in 'ab':\n    print(c, end='')\nprint()\n", context.clone())
            .await
            .unwrap();
        assert_eq!(context.output().contents(), "ab\n");
    }

    #[tokio::test]
    async fn test_merge_identity() {
        let context = setup_context();
        context.assign(
            "_globs",
            Value::from(serde_json::json!({"__name__": "admin_eval.plugins.sudo"})),
        );
        let statements = vec![Statement::new(
            StatementKind::MergeIdentity {
                binding: "_globs".to_string(),
            },
            1,
        )];
        StatementEvaluator::default()
            .eval_block(&statements, context.clone())
            .await
            .unwrap();
        assert!(context.globals_view().contains_key("__name__"));
    }
}
