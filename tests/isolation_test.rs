use std::sync::Arc;

use std::time::Duration;

use admin_eval::{
    engine::scope::{Isolation, Namespace},
    Bindings, Engine, EngineConfig, Value,
};
use pretty_assertions::assert_eq;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[ctor::ctor]
fn init_tests() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

const SLOW: &str = "commit('a', 1)\nawait sleep(0.05)\n'slow'";
const FAST: &str = "await sleep(0.01)\ncommit('b', 2)\n'fast'";

/// Runs two overlapping evaluations that each publish one name, and returns
/// the names left in the namespace.
async fn overlapping_commits(isolation: Isolation) -> Vec<String> {
    let namespace = Arc::new(Namespace::new());
    let engine = Engine::new(
        EngineConfig {
            isolation,
            ..EngineConfig::default()
        },
        namespace.clone(),
    );
    let bindings = Bindings::new();
    let (slow, fast) = tokio::join!(
        engine.evaluate(SLOW, &bindings),
        engine.evaluate(FAST, &bindings)
    );
    assert_eq!(slow.unwrap().to_string(), "slow");
    assert_eq!(fast.unwrap().to_string(), "fast");
    namespace.to_map().into_keys().collect()
}

#[tokio::test]
async fn test_frame_isolation_keeps_both_commits() {
    assert_eq!(overlapping_commits(Isolation::Frame).await, vec!["a", "b"]);
}

#[tokio::test]
async fn test_serialized_isolation_keeps_both_commits() {
    assert_eq!(
        overlapping_commits(Isolation::Serialized).await,
        vec!["a", "b"]
    );
}

/// The legacy unserialized mode loses the commit made by the evaluation that
/// finished first: the slower one restores a snapshot taken before it.
#[tokio::test]
async fn test_snapshot_isolation_loses_an_update() {
    assert_eq!(overlapping_commits(Isolation::Snapshot).await, vec!["a"]);
}

/// A block started while an evaluation holds the gate merges its bindings
/// only after that evaluation restored its snapshot.
#[tokio::test]
async fn test_serialized_exec_merge_survives_running_eval() {
    let namespace = Arc::new(Namespace::new());
    let engine = Engine::new(
        EngineConfig {
            isolation: Isolation::Serialized,
            ..EngineConfig::default()
        },
        namespace.clone(),
    );
    let bindings = Bindings::new();
    let (evaluated, executed) = tokio::join!(
        engine.evaluate("await sleep(0.05)\n1", &bindings),
        async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            engine.execute("pass", Value::Int(1), Value::Int(2)).await
        }
    );
    assert_eq!(evaluated.unwrap(), Value::Int(1));
    executed.unwrap();

    let keys: Vec<String> = namespace.to_map().into_keys().collect();
    assert_eq!(keys, vec!["c", "m"]);
    assert_eq!(namespace.get("m"), Some(Value::Int(2)));
}
