//! Shared test helpers for integration tests

use invoke_js::ast::{Script, Statement};
use invoke_js::{EngineConfig, ExecutionStrategy, Runtime, Value};
use std::sync::Once;

static TRACING: Once = Once::new();

/// Install a `RUST_LOG`-filtered subscriber once per test binary
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A runtime evaluating bodies with `strategy`
#[allow(dead_code)]
pub fn runtime(strategy: ExecutionStrategy) -> Runtime {
    init_tracing();
    Runtime::with_config(EngineConfig::default().with_strategy(strategy))
}

/// Run a statement list as a script and return its completion value
#[allow(dead_code)]
pub fn run_with(strategy: ExecutionStrategy, statements: Vec<Statement>) -> invoke_js::Result<Value> {
    runtime(strategy).run_script(&Script::new(statements))
}

/// Run under the tree-walking interpreter
#[allow(dead_code)]
pub fn run(statements: Vec<Statement>) -> invoke_js::Result<Value> {
    run_with(ExecutionStrategy::TreeWalk, statements)
}

/// Run under both strategies and check they agree
#[allow(dead_code)]
pub fn run_both(statements: Vec<Statement>) -> invoke_js::Result<Value> {
    let walked = run_with(ExecutionStrategy::TreeWalk, statements.clone());
    let compiled = run_with(ExecutionStrategy::Bytecode, statements);
    match (&walked, &compiled) {
        (Ok(a), Ok(b)) => assert_eq!(a, b, "strategies disagree"),
        (Err(a), Err(b)) => assert_eq!(a.kind(), b.kind(), "strategies fail differently"),
        _ => panic!("strategies disagree: {:?} vs {:?}", walked, compiled),
    }
    walked
}
