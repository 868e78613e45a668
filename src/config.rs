//! Engine configuration
//!
//! The body-evaluation strategy is chosen once per [`VM`](crate::runtime::VM)
//! and applies to every call it performs.

use crate::bytecode::OptimizerConfig;
use crate::error::{Error, Result};
use crate::gc::GcConfig;
use serde::{Deserialize, Serialize};

/// How function bodies are evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// Walk the AST directly. Supports async functions, not generators.
    #[default]
    TreeWalk,
    /// Compile bodies to bytecode on first call. Supports generators, not async functions.
    Bytecode,
}

/// Configuration for a [`Runtime`](crate::Runtime)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Body evaluation strategy
    pub strategy: ExecutionStrategy,
    /// Bytecode optimisation passes run after compilation
    pub optimizer: OptimizerConfig,
    /// Log the disassembly of every compiled executable
    pub dump_bytecode: bool,
    /// Maximum depth of the execution context stack
    pub max_call_depth: usize,
    /// Garbage collector settings
    pub gc: GcConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: ExecutionStrategy::TreeWalk,
            optimizer: OptimizerConfig::default(),
            dump_bytecode: false,
            max_call_depth: 512,
            gc: GcConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::InternalError(format!("invalid engine config: {}", e)))
    }

    /// Set the execution strategy
    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the optimizer configuration
    pub fn with_optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Enable or disable bytecode dumps
    pub fn with_dump_bytecode(mut self, dump: bool) -> Self {
        self.dump_bytecode = dump;
        self
    }

    /// Set the call depth limit
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Set the garbage collector configuration
    pub fn with_gc(mut self, gc: GcConfig) -> Self {
        self.gc = gc;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.strategy, ExecutionStrategy::TreeWalk);
        assert_eq!(config.max_call_depth, 512);
        assert!(!config.dump_bytecode);
    }

    #[test]
    fn test_config_from_json() {
        let config =
            EngineConfig::from_json(r#"{ "strategy": "bytecode", "max_call_depth": 64 }"#).unwrap();
        assert_eq!(config.strategy, ExecutionStrategy::Bytecode);
        assert_eq!(config.max_call_depth, 64);
        assert!(config.optimizer.constant_folding);
    }

    #[test]
    fn test_config_from_bad_json() {
        assert!(EngineConfig::from_json("{ strategy: 1 }").is_err());
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_strategy(ExecutionStrategy::Bytecode)
            .with_dump_bytecode(true)
            .with_max_call_depth(8);
        assert_eq!(config.strategy, ExecutionStrategy::Bytecode);
        assert!(config.dump_bytecode);
        assert_eq!(config.max_call_depth, 8);
    }
}
