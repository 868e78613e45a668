//! Runtime environment for invoke-js
//!
//! This module provides the invocation engine proper: values and objects,
//! environment records and execution contexts, the call/construct protocol,
//! declaration instantiation, body dispatch, and the generator and async
//! bridges. [`Runtime`] is the embedder-facing facade over a [`VM`].

pub(crate) mod class;
pub mod context;
mod declaration;
mod dispatch;
pub mod environment;
mod function;
pub mod generator;
pub mod object;
mod operations;
mod promise;
mod realm;
pub mod value;
mod vm;

pub use context::{ContextStack, ExecutionContext};
pub use declaration::DefaultEvaluation;
pub use dispatch::Completion;
pub use environment::{Environment, EnvironmentKind, PrivateEnvironment, Reference, ReferenceBase};
pub use function::{ClassFieldDefinition, ConstructorKind, FunctionObject, FunctionRole, ThisMode};
pub use generator::{GeneratorState, ResumeInput};
pub use object::{HostFn, NativeBehaviour, NativeFunction, Object, ObjectKind, Property};
pub use promise::{PromiseCapability, PromiseState};
pub use realm::{Intrinsics, Realm};
pub use value::{PropertyKey, Value};
pub use vm::{ExecutionResult, FrameSnapshot, VM};

use crate::ast::Script;
use crate::bytecode::{Compiler, Optimizer};
use crate::config::{EngineConfig, ExecutionStrategy};
use crate::error::{Error, Result};
use crate::gc::{GcStats, ObjectId};
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, info};

/// The invoke-js runtime
pub struct Runtime {
    vm: VM,
}

impl Runtime {
    /// Create a new runtime with the default configuration
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create a runtime with custom configuration
    pub fn with_config(config: EngineConfig) -> Self {
        info!(strategy = ?config.strategy, max_call_depth = config.max_call_depth, "runtime created");
        Self { vm: VM::new(config) }
    }

    /// The underlying VM
    pub fn vm(&self) -> &VM {
        &self.vm
    }

    /// The underlying VM, mutably
    pub fn vm_mut(&mut self) -> &mut VM {
        &mut self.vm
    }

    /// The configuration this runtime was built with
    pub fn config(&self) -> &EngineConfig {
        &self.vm.config
    }

    /// Evaluate a script against the global environment
    ///
    /// Returns the value of the last expression statement, or `undefined`.
    pub fn run_script(&mut self, script: &Script) -> Result<Value> {
        let start = Instant::now();
        let saved = self.vm.running_context().clone();
        {
            let context = self.vm.running_context_mut();
            context.is_strict = script.is_strict;
            context.annex_b_function_names = if script.is_strict {
                Vec::new()
            } else {
                script.scope.annex_b_candidates.clone()
            };
        }

        let result = self
            .vm
            .global_declaration_instantiation(script)
            .and_then(|()| self.evaluate_script(script));

        let context = self.vm.running_context_mut();
        context.lexical_environment = saved.lexical_environment;
        context.is_strict = saved.is_strict;
        context.annex_b_function_names = saved.annex_b_function_names;

        debug!(
            statements = script.statements.len(),
            ok = result.is_ok(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "script evaluated"
        );
        result.map_err(|error| self.vm.error_with_stack(error))
    }

    fn evaluate_script(&mut self, script: &Script) -> Result<Value> {
        match self.vm.config.strategy {
            ExecutionStrategy::TreeWalk => match self.vm.evaluate_statements(&script.statements)? {
                Completion::Normal(value) => Ok(value.unwrap_or_default()),
                Completion::Return(value) => Ok(value),
                Completion::Break => Err(Error::syntax_error("Illegal break statement")),
                Completion::Continue => Err(Error::syntax_error(
                    "Illegal continue statement: no surrounding iteration statement",
                )),
            },
            ExecutionStrategy::Bytecode => {
                let mut executable = Compiler::generate_script(script)?;
                Optimizer::with_config(self.vm.config.optimizer.clone()).optimize(&mut executable);
                if self.vm.config.dump_bytecode {
                    debug!("\n{}", executable.disassemble());
                }
                match self.vm.run_executable(&executable)? {
                    ExecutionResult::Return(value) => Ok(value),
                    ExecutionResult::Yield(..) => {
                        Err(Error::InternalError("yield escaped script code".to_string()))
                    }
                }
            }
        }
    }

    /// Call a function value with an explicit receiver
    pub fn call(&mut self, callee: &Value, this_value: Value, arguments: Vec<Value>) -> Result<Value> {
        self.vm.call(callee, this_value, arguments)
    }

    /// Construct with `new`
    pub fn construct(&mut self, constructor: &Value, arguments: Vec<Value>) -> Result<Value> {
        self.vm.construct(constructor, arguments, None)
    }

    /// Get a property of any value, walking the prototype chain
    pub fn get_property(&self, base: &Value, key: impl Into<PropertyKey>) -> Result<Value> {
        self.vm.get_value_property(base, &key.into())
    }

    /// Read a global binding (lexical bindings first, then the global object)
    pub fn get_global(&self, name: &str) -> Result<Value> {
        let reference = self.vm.resolve_reference(name, Some(self.vm.realm.global_environment));
        self.vm.get_reference_value(&reference)
    }

    /// Define a property on the global object
    pub fn set_global(&mut self, name: &str, value: Value) -> Result<()> {
        let global = self.vm.realm.global_object;
        self.vm.create_data_property_or_throw(global, PropertyKey::from(name), value)
    }

    /// Expose a host closure as a global function
    pub fn register_function<F>(&mut self, name: &str, function: F) -> Result<ObjectId>
    where
        F: Fn(&mut VM, &Value, &[Value]) -> Result<Value> + 'static,
    {
        let host: HostFn = Rc::new(function);
        let object = self.vm.heap.allocate(Object::with_kind(
            ObjectKind::NativeFunction(NativeFunction {
                name: name.to_string(),
                behaviour: NativeBehaviour::Host(host),
                captures: Vec::new(),
            }),
            Some(self.vm.realm.intrinsics.function_prototype),
        ));
        self.set_global(name, Value::Object(object))?;
        Ok(object)
    }

    /// Own property keys in definition order
    pub fn own_property_keys(&self, value: &Value) -> Result<Vec<PropertyKey>> {
        let object = self.vm.expect_object(value)?;
        Ok(self.vm.heap.get(object).own_property_keys())
    }

    /// Run a full collection, keeping `extra` alive alongside the realm
    pub fn collect_garbage(&mut self, extra: &[Value]) -> GcStats {
        self.vm.collect_garbage(extra)
    }

    /// Settlement state of a promise value
    pub fn promise_state(&self, promise: &Value) -> Option<PromiseState> {
        self.vm.promise_state(promise.as_object()?).cloned()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
