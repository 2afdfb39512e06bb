use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::builtins::CapabilityTable;
use super::evaluator::{EvalError, EvalResult};
use super::output::{OutputSink, SharedOutput};
use super::pending::SettlePolicy;
use super::value::Value;
use crate::engine::scope::{Isolation, Namespace};

/// Deepest evaluator recursion a snippet may reach. Each level holds a boxed
/// future on the native stack while it is polled.
pub const MAX_EVAL_DEPTH: usize = 100;

/// Where a name was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum VariableAccess {
    Local,
    Identity,
    Namespace,
    Builtin,
}

/// State of one evaluation frame.
///
/// Names resolve through the frame's locals, then the identity overlay, then
/// the shared [`Namespace`], then the capability table. Assignments only ever
/// touch locals; [`ExecutionContext::commit`] is the one way to publish into
/// the namespace.
pub struct ExecutionContext {
    locals: RwLock<BTreeMap<String, Value>>,
    identity: RwLock<BTreeMap<String, Value>>,
    namespace: Arc<Namespace>,
    capabilities: Arc<CapabilityTable>,
    output: SharedOutput,
    isolation: Isolation,
    settle: SettlePolicy,
    journal: Mutex<Vec<(String, Value)>>,
    own_writes: AtomicU64,
    line: AtomicUsize,
    depth: AtomicUsize,
}

/// One level of evaluator recursion; released on drop.
pub struct DepthGuard {
    context: Arc<ExecutionContext>,
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        self.context.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ExecutionContext {
    pub fn new(namespace: Arc<Namespace>, capabilities: Arc<CapabilityTable>) -> Self {
        Self {
            locals: RwLock::new(BTreeMap::new()),
            identity: RwLock::new(BTreeMap::new()),
            namespace,
            capabilities,
            output: Arc::new(OutputSink::log()),
            isolation: Isolation::default(),
            settle: SettlePolicy::default(),
            journal: Mutex::new(Vec::new()),
            own_writes: AtomicU64::new(0),
            line: AtomicUsize::new(1),
            depth: AtomicUsize::new(0),
        }
    }

    pub fn with_isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn with_output(mut self, output: SharedOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_settle(mut self, settle: SettlePolicy) -> Self {
        self.settle = settle;
        self
    }

    pub fn lookup(&self, name: &str) -> EvalResult<Value> {
        self.resolve(name)
            .map(|(_, value)| value)
            .ok_or_else(|| EvalError::Name(name.to_string()))
    }

    pub fn resolve(&self, name: &str) -> Option<(VariableAccess, Value)> {
        if let Some(value) = self.locals.read().get(name) {
            return Some((VariableAccess::Local, value.clone()));
        }
        if let Some(value) = self.identity.read().get(name) {
            return Some((VariableAccess::Identity, value.clone()));
        }
        if let Some(value) = self.namespace.get(name) {
            return Some((VariableAccess::Namespace, value));
        }
        self.capabilities
            .lookup(name)
            .map(|value| (VariableAccess::Builtin, value))
    }

    pub fn assign(&self, name: impl Into<String>, value: Value) {
        self.locals.write().insert(name.into(), value);
    }

    /// Copies the caller's identity names into this frame's global view.
    ///
    /// Frame isolation keeps them in a per-frame overlay; the legacy modes
    /// write them into the shared namespace, which the scope guard later
    /// rolls back.
    pub fn merge_identity(&self, values: BTreeMap<String, Value>) {
        if self.isolation == Isolation::Frame {
            self.identity.write().extend(values);
        } else {
            self.merge_into_namespace(values);
        }
    }

    /// Writes `values` straight into the shared namespace as one write of
    /// this frame. Nothing is journaled, so a restoring scope guard drops
    /// them again.
    pub fn merge_into_namespace(&self, values: impl IntoIterator<Item = (String, Value)>) {
        self.namespace.merge(values);
        self.own_writes.fetch_add(1, Ordering::SeqCst);
    }

    /// Publishes `name` into the shared namespace.
    pub fn commit(&self, name: &str, value: Value) {
        debug!(name, "committing to namespace");
        self.namespace.set(name, value.clone());
        self.own_writes.fetch_add(1, Ordering::SeqCst);
        self.journal.lock().push((name.to_string(), value));
    }

    /// What `globals()` shows: the namespace with the identity overlay on top.
    pub fn globals_view(&self) -> BTreeMap<String, Value> {
        let mut view = self.namespace.to_map();
        view.extend(
            self.identity
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        view
    }

    pub fn commits(&self) -> Vec<(String, Value)> {
        self.journal.lock().clone()
    }

    /// Number of namespace writes made by this frame.
    pub fn own_writes(&self) -> u64 {
        self.own_writes.load(Ordering::SeqCst)
    }

    /// Enters one more level of evaluation. Fails with `RecursionError` past
    /// [`MAX_EVAL_DEPTH`].
    pub fn descend(self: &Arc<Self>) -> EvalResult<DepthGuard> {
        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        let guard = DepthGuard {
            context: self.clone(),
        };
        if depth > MAX_EVAL_DEPTH {
            return Err(EvalError::Recursion(
                "maximum recursion depth exceeded".to_string(),
            ));
        }
        Ok(guard)
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn set_line(&self, line: usize) {
        self.line.store(line, Ordering::SeqCst);
    }

    /// Line of the statement currently (or last) executing.
    pub fn line(&self) -> usize {
        self.line.load(Ordering::SeqCst)
    }

    pub fn print(&self, text: &str) {
        self.output.write(text);
    }

    pub fn output(&self) -> &SharedOutput {
        &self.output
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    pub fn settle_policy(&self) -> &SettlePolicy {
        &self.settle
    }

    pub fn isolation(&self) -> Isolation {
        self.isolation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::builtins::STANDARD_CAPABILITIES;
    use pretty_assertions::assert_eq;

    fn setup_context(isolation: Isolation) -> (Arc<Namespace>, ExecutionContext) {
        let namespace = Arc::new(Namespace::new());
        namespace.set("shared", Value::Int(1));
        let context = ExecutionContext::new(namespace.clone(), STANDARD_CAPABILITIES.clone())
            .with_isolation(isolation);
        (namespace, context)
    }

    #[test]
    fn test_lookup_order() {
        let (_, context) = setup_context(Isolation::Frame);
        assert_eq!(context.lookup("shared").unwrap(), Value::Int(1));
        assert_eq!(
            context.resolve("len").map(|(access, _)| access),
            Some(VariableAccess::Builtin)
        );

        context.assign("shared", Value::Int(2));
        assert_eq!(context.lookup("shared").unwrap(), Value::Int(2));
        assert!(matches!(
            context.lookup("missing"),
            Err(EvalError::Name(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_assignment_stays_local() {
        let (namespace, context) = setup_context(Isolation::Frame);
        context.assign("x", Value::Int(5));
        assert!(namespace.get("x").is_none());
        assert_eq!(context.own_writes(), 0);
    }

    #[test]
    fn test_commit_publishes() {
        let (namespace, context) = setup_context(Isolation::Frame);
        context.commit("x", Value::Int(5));
        assert_eq!(namespace.get("x"), Some(Value::Int(5)));
        assert_eq!(context.commits(), vec![("x".to_string(), Value::Int(5))]);
        assert_eq!(context.own_writes(), 1);
    }

    #[test]
    fn test_identity_overlay_in_frame_mode() {
        let (namespace, context) = setup_context(Isolation::Frame);
        let mut identity = BTreeMap::new();
        identity.insert("__name__".to_string(), Value::from("plugins.sudo"));
        context.merge_identity(identity);
        assert_eq!(context.lookup("__name__").unwrap(), Value::from("plugins.sudo"));
        assert!(namespace.get("__name__").is_none());
        assert!(context.globals_view().contains_key("__name__"));
    }

    #[test]
    fn test_descend_is_bounded() {
        let (_, context) = setup_context(Isolation::Frame);
        let context = Arc::new(context);
        let mut guards = Vec::new();
        for _ in 0..MAX_EVAL_DEPTH {
            guards.push(context.descend().unwrap());
        }
        assert!(matches!(context.descend(), Err(EvalError::Recursion(_))));
        // the failed attempt does not leak a level
        assert_eq!(context.depth(), MAX_EVAL_DEPTH);
        guards.clear();
        assert_eq!(context.depth(), 0);
    }

    #[test]
    fn test_identity_written_through_in_legacy_mode() {
        let (namespace, context) = setup_context(Isolation::Snapshot);
        let mut identity = BTreeMap::new();
        identity.insert("__name__".to_string(), Value::from("plugins.sudo"));
        context.merge_identity(identity);
        assert_eq!(namespace.get("__name__"), Some(Value::from("plugins.sudo")));
        assert_eq!(context.own_writes(), 1);
    }
}
