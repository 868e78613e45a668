//! Body evaluation dispatcher
//!
//! Chooses between the tree-walking interpreter and compiled bytecode
//! according to [`ExecutionStrategy`]. Generators only run compiled and
//! async functions only run under the tree-walker; asking for the other
//! combination is a `NotImplemented` error rather than a silent fallback.

use super::declaration::DefaultEvaluation;
use super::generator::GeneratorObject;
use super::object::{Object, ObjectKind};
use super::value::Value;
use super::vm::ExecutionResult;
use super::VM;
use crate::ast::FunctionKind;
use crate::bytecode::{Compiler, Executable, Optimizer};
use crate::config::ExecutionStrategy;
use crate::error::{Error, Result};
use crate::gc::ObjectId;
use std::rc::Rc;
use std::time::Instant;
use tracing::debug;

/// Outcome of evaluating a statement list
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Fell through, carrying the last statement value if any
    Normal(Option<Value>),
    Return(Value),
    Break,
    Continue,
}

impl Completion {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Completion::Normal(_) => "normal",
            Completion::Return(_) => "return",
            Completion::Break => "break",
            Completion::Continue => "continue",
        }
    }
}

impl VM {
    /// Evaluate the body of the running function
    ///
    /// The callee context must already be pushed and `this` bound.
    pub fn evaluate_body(&mut self, function: ObjectId) -> Result<Completion> {
        let callee = self.function_object(function)?;
        let kind = callee.kind;
        let node = callee.node.clone();

        match self.config.strategy {
            ExecutionStrategy::TreeWalk => match kind {
                FunctionKind::Regular => {
                    self.function_declaration_instantiation(function, DefaultEvaluation::Evaluate)?;
                    self.evaluate_function_body(&node)
                }
                FunctionKind::Generator => Err(Error::not_implemented(
                    "Generator function execution in AST interpreter",
                )),
                FunctionKind::Async => {
                    let capability = self.new_promise_capability();
                    match self.function_declaration_instantiation(function, DefaultEvaluation::Evaluate) {
                        Ok(()) => self.async_function_start(&capability, &node)?,
                        Err(error) if error.is_engine_error() => return Err(error),
                        Err(error) => {
                            let reason = self.error_to_value(error);
                            capability.reject(self, reason)?;
                        }
                    }
                    Ok(Completion::Return(Value::Object(capability.promise)))
                }
            },
            ExecutionStrategy::Bytecode => {
                if kind == FunctionKind::Async {
                    return Err(Error::not_implemented(
                        "Async function execution in bytecode interpreter",
                    ));
                }
                self.function_declaration_instantiation(function, DefaultEvaluation::Skip)?;
                let executable = self.function_executable(function)?;

                if kind == FunctionKind::Generator {
                    let default = self.realm.intrinsics.generator_prototype;
                    let prototype = self.get_prototype_from_constructor(function, default)?;
                    let generator = GeneratorObject::new(executable, self.running_context().clone());
                    let object = self.heap.allocate(Object::with_kind(
                        ObjectKind::Generator(Box::new(generator)),
                        Some(prototype),
                    ));
                    return Ok(Completion::Return(Value::Object(object)));
                }

                match self.run_executable(&executable)? {
                    ExecutionResult::Return(value) => Ok(Completion::Return(value)),
                    ExecutionResult::Yield(..) => Err(Error::InternalError(
                        "yield escaped a non-generator body".to_string(),
                    )),
                }
            }
        }
    }

    /// The compiled body of `function`, compiling and optimizing it on first use
    pub fn function_executable(&mut self, function: ObjectId) -> Result<Rc<Executable>> {
        let callee = self.function_object(function)?;
        if let Some(executable) = &callee.executable {
            return Ok(executable.clone());
        }
        let node = callee.node.clone();
        let name = callee.name.clone();
        let is_generator = callee.kind == FunctionKind::Generator;

        let start = Instant::now();
        let mut executable = Compiler::generate(&node, is_generator)?;
        Optimizer::with_config(self.config.optimizer.clone()).optimize(&mut executable);
        debug!(
            function = %name,
            code_size = executable.code.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "compiled function body"
        );
        if self.config.dump_bytecode {
            debug!("\n{}", executable.disassemble());
        }

        let executable = Rc::new(executable);
        self.heap
            .get_mut(function)
            .as_function_mut()
            .ok_or_else(|| Error::InternalError(format!("{:?} is not a user-defined function", function)))?
            .executable = Some(executable.clone());
        Ok(executable)
    }
}
