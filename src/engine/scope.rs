//! The process-wide namespace and the policies that protect it.
//!
//! # Isolation
//!
//! | mode         | snapshot/restore | mutual exclusion | concurrent commits |
//! |--------------|------------------|------------------|--------------------|
//! | `frame`      | no               | no               | kept               |
//! | `serialized` | yes              | FIFO lock        | kept               |
//! | `snapshot`   | yes              | no               | may be lost        |
//!
//! Under `snapshot`, two overlapping evaluations each restore their own
//! snapshot on exit, so whichever finishes last silently discards the other's
//! commits. [`ScopeGuard`] detects this through the namespace version and
//! logs a warning, but does not prevent it.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::eval::context::ExecutionContext;
use crate::eval::value::Value;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Isolation {
    /// Per-frame state; only `commit` reaches the namespace.
    #[default]
    Frame,
    /// Snapshot/restore with every evaluation queued behind one lock.
    Serialized,
    /// Snapshot/restore with no mutual exclusion.
    Snapshot,
}

#[derive(Debug, Default)]
struct NamespaceState {
    values: BTreeMap<String, Value>,
    version: u64,
}

/// Name→value pairs shared by every evaluation in the process. Every write
/// bumps the version.
#[derive(Debug, Default)]
pub struct Namespace {
    state: RwLock<NamespaceState>,
}

/// A copy of the namespace at some version.
#[derive(Debug, Clone)]
pub struct Snapshot {
    values: BTreeMap<String, Value>,
    version: u64,
}

impl Snapshot {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.state.read().values.get(name).cloned()
    }

    pub fn set(&self, name: impl Into<String>, value: Value) -> u64 {
        let mut state = self.state.write();
        state.values.insert(name.into(), value);
        state.version += 1;
        state.version
    }

    /// Inserts all of `values` as one write.
    pub fn merge(&self, values: impl IntoIterator<Item = (String, Value)>) -> u64 {
        let mut state = self.state.write();
        state.values.extend(values);
        state.version += 1;
        state.version
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.read();
        Snapshot {
            values: state.values.clone(),
            version: state.version,
        }
    }

    /// Replaces the contents with `snapshot` plus `commits`, applied in order.
    pub fn restore(&self, snapshot: &Snapshot, commits: &[(String, Value)]) {
        let mut state = self.state.write();
        state.values.clone_from(&snapshot.values);
        for (name, value) in commits {
            state.values.insert(name.clone(), value.clone());
        }
        state.version += 1;
    }

    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.state.read().values.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Brackets evaluations according to the configured [`Isolation`].
pub struct ScopeManager {
    namespace: Arc<Namespace>,
    isolation: Isolation,
    gate: Mutex<()>,
}

impl ScopeManager {
    pub fn new(namespace: Arc<Namespace>, isolation: Isolation) -> Self {
        Self {
            namespace,
            isolation,
            gate: Mutex::new(()),
        }
    }

    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    pub fn isolation(&self) -> Isolation {
        self.isolation
    }

    /// Opens the bracket for one evaluation.
    ///
    /// `restore` asks for snapshot/restore semantics; it is ignored under
    /// frame isolation, which never needs it. Under serialized isolation this
    /// waits for earlier evaluations to leave.
    pub async fn enter(&self, context: Arc<ExecutionContext>, restore: bool) -> ScopeGuard<'_> {
        let permit = match self.isolation {
            Isolation::Serialized => Some(self.gate.lock().await),
            _ => None,
        };
        let snapshot = match self.isolation {
            Isolation::Frame => None,
            Isolation::Serialized | Isolation::Snapshot if restore => {
                Some(self.namespace.snapshot())
            }
            _ => None,
        };
        if let Some(snapshot) = &snapshot {
            debug!(version = snapshot.version(), "namespace snapshot taken");
        }
        ScopeGuard {
            namespace: &self.namespace,
            snapshot,
            context,
            _permit: permit,
        }
    }
}

/// Restores the namespace when dropped, including during unwinding.
pub struct ScopeGuard<'a> {
    namespace: &'a Namespace,
    snapshot: Option<Snapshot>,
    context: Arc<ExecutionContext>,
    _permit: Option<MutexGuard<'a, ()>>,
}

impl ScopeGuard<'_> {
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        let Some(snapshot) = self.snapshot.take() else {
            return;
        };
        let expected = snapshot.version() + self.context.own_writes();
        let current = self.namespace.version();
        if current != expected {
            warn!(
                snapshot_version = snapshot.version(),
                current_version = current,
                "namespace written by a concurrent evaluation; discarding those writes"
            );
        }
        self.namespace.restore(&snapshot, &self.context.commits());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::builtins::STANDARD_CAPABILITIES;
    use pretty_assertions::assert_eq;

    fn context_for(manager: &ScopeManager) -> Arc<ExecutionContext> {
        Arc::new(
            ExecutionContext::new(manager.namespace().clone(), STANDARD_CAPABILITIES.clone())
                .with_isolation(manager.isolation()),
        )
    }

    #[test]
    fn test_namespace_versioning() {
        let namespace = Namespace::new();
        assert_eq!(namespace.version(), 0);
        namespace.set("a", Value::Int(1));
        namespace.merge(vec![
            ("b".to_string(), Value::Int(2)),
            ("c".to_string(), Value::Int(3)),
        ]);
        assert_eq!(namespace.version(), 2);
        assert_eq!(namespace.len(), 3);
    }

    #[test]
    fn test_restore_applies_commits_over_snapshot() {
        let namespace = Namespace::new();
        namespace.set("a", Value::Int(1));
        let snapshot = namespace.snapshot();
        namespace.set("a", Value::Int(99));
        namespace.set("scratch", Value::Int(0));
        namespace.restore(&snapshot, &[("b".to_string(), Value::Int(2))]);

        let mut expected = BTreeMap::new();
        expected.insert("a".to_string(), Value::Int(1));
        expected.insert("b".to_string(), Value::Int(2));
        assert_eq!(namespace.to_map(), expected);
    }

    #[tokio::test]
    async fn test_guard_restores_on_drop() {
        let manager = ScopeManager::new(Arc::new(Namespace::new()), Isolation::Snapshot);
        manager.namespace().set("keep", Value::Int(1));
        let context = context_for(&manager);
        {
            let guard = manager.enter(context.clone(), true).await;
            assert!(guard.snapshot().is_some());
            let mut identity = BTreeMap::new();
            identity.insert("__name__".to_string(), Value::from("x"));
            context.merge_identity(identity);
            context.commit("published", Value::Int(2));
        }
        assert_eq!(manager.namespace().get("__name__"), None);
        assert_eq!(manager.namespace().get("published"), Some(Value::Int(2)));
        assert_eq!(manager.namespace().get("keep"), Some(Value::Int(1)));
    }

    #[tokio::test]
    async fn test_frame_isolation_takes_no_snapshot() {
        let manager = ScopeManager::new(Arc::new(Namespace::new()), Isolation::Frame);
        let guard = manager.enter(context_for(&manager), true).await;
        assert!(guard.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_serialized_isolation_queues_evaluations() {
        let manager = Arc::new(ScopeManager::new(
            Arc::new(Namespace::new()),
            Isolation::Serialized,
        ));
        let first = manager.enter(context_for(&manager), true).await;

        let waiting = {
            let manager = manager.clone();
            tokio::spawn(async move {
                let _second = manager.enter(context_for(&manager), true).await;
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(first);
        waiting.await.unwrap();
    }

    #[test]
    fn test_isolation_parsing() {
        assert_eq!("frame".parse::<Isolation>().unwrap(), Isolation::Frame);
        assert_eq!(Isolation::Serialized.to_string(), "serialized");
        assert!("shared".parse::<Isolation>().is_err());
    }
}
