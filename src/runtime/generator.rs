//! Generator objects
//!
//! A generator is an explicit state machine over a compiled body. While
//! suspended it owns the execution context it was running in and the
//! detached [`FrameSnapshot`] of its bytecode frame; resuming pushes that
//! context back and continues the frame from the snapshot.

use super::context::ExecutionContext;
use super::object::ObjectKind;
use super::value::Value;
use super::vm::{ExecutionResult, FrameSnapshot};
use super::VM;
use crate::bytecode::Executable;
use crate::error::{Error, Result};
use crate::gc::{ObjectId, Trace, Visitor};
use std::rc::Rc;
use tracing::debug;

/// `[[GeneratorState]]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    NotStarted,
    Suspended,
    Running,
    Completed,
}

/// How a generator is being resumed
#[derive(Debug, Clone)]
pub enum ResumeInput {
    /// `next(value)`: the value becomes the result of the pending `yield`
    Next(Value),
    /// `return(value)`
    Return(Value),
    /// `throw(value)`
    Throw(Value),
}

/// Payload of `ObjectKind::Generator`
#[derive(Debug)]
pub struct GeneratorObject {
    pub state: GeneratorState,
    pub executable: Rc<Executable>,
    /// Saved context; `None` while running or once completed
    pub context: Option<ExecutionContext>,
    pub frame: FrameSnapshot,
}

impl GeneratorObject {
    /// A not-yet-started generator over `executable`
    pub fn new(executable: Rc<Executable>, context: ExecutionContext) -> Self {
        Self {
            state: GeneratorState::NotStarted,
            executable,
            context: Some(context),
            frame: FrameSnapshot::default(),
        }
    }
}

impl Trace for GeneratorObject {
    fn trace(&self, visitor: &mut Visitor) {
        if let Some(context) = &self.context {
            context.trace(visitor);
        }
        self.frame.trace(visitor);
    }
}

impl VM {
    fn generator_mut(&mut self, generator: ObjectId) -> Result<&mut GeneratorObject> {
        match &mut self.heap.get_mut(generator).kind {
            ObjectKind::Generator(payload) => Ok(payload),
            _ => Err(Error::InternalError(format!("{:?} is not a generator", generator))),
        }
    }

    /// State of a generator object
    pub fn generator_state(&self, generator: ObjectId) -> Option<GeneratorState> {
        match &self.heap.get(generator).kind {
            ObjectKind::Generator(payload) => Some(payload.state),
            _ => None,
        }
    }

    /// GeneratorResume / GeneratorResumeAbrupt
    ///
    /// Returns the iterator result object `{ value, done }`.
    pub fn generator_resume(&mut self, generator: ObjectId, input: ResumeInput) -> Result<Value> {
        let state = self.generator_mut(generator)?.state;
        match (state, input) {
            (GeneratorState::Running, _) => Err(Error::type_error("Generator is already running")),
            (GeneratorState::Completed, ResumeInput::Next(_)) => {
                Ok(self.create_iter_result_object(Value::Undefined, true))
            }
            (_, ResumeInput::Return(value)) => {
                self.complete_generator(generator)?;
                Ok(self.create_iter_result_object(value, true))
            }
            (_, ResumeInput::Throw(value)) => {
                self.complete_generator(generator)?;
                Err(Error::Thrown(value))
            }
            (GeneratorState::NotStarted, ResumeInput::Next(_)) => self.run_generator(generator, state),
            (GeneratorState::Suspended, ResumeInput::Next(value)) => {
                self.generator_mut(generator)?.frame.stack.push(value);
                self.run_generator(generator, state)
            }
        }
    }

    fn complete_generator(&mut self, generator: ObjectId) -> Result<()> {
        let payload = self.generator_mut(generator)?;
        if payload.state != GeneratorState::Completed {
            debug!(?generator, from = ?payload.state, "generator completed");
        }
        payload.state = GeneratorState::Completed;
        payload.context = None;
        payload.frame = FrameSnapshot::default();
        Ok(())
    }

    fn run_generator(&mut self, generator: ObjectId, previous: GeneratorState) -> Result<Value> {
        let payload = self.generator_mut(generator)?;
        let executable = payload.executable.clone();
        let context = payload
            .context
            .take()
            .ok_or_else(|| Error::InternalError("suspended generator without a context".to_string()))?;
        let snapshot = std::mem::take(&mut payload.frame);
        payload.state = GeneratorState::Running;

        if let Err(error) = self.contexts.push(context.clone()) {
            let payload = self.generator_mut(generator)?;
            payload.state = previous;
            payload.context = Some(context);
            payload.frame = snapshot;
            return Err(error);
        }
        debug!(?generator, ip = snapshot.ip, "generator resumed");

        let result = self.resume_executable(&executable, snapshot);
        let context = self.contexts.pop();

        let payload = self.generator_mut(generator)?;
        match result {
            Ok(ExecutionResult::Yield(value, snapshot)) => {
                debug!(?generator, ip = snapshot.ip, "generator suspended");
                payload.state = GeneratorState::Suspended;
                payload.context = Some(context);
                payload.frame = snapshot;
                Ok(self.create_iter_result_object(value, false))
            }
            Ok(ExecutionResult::Return(value)) => {
                debug!(?generator, "generator completed");
                payload.state = GeneratorState::Completed;
                Ok(self.create_iter_result_object(value, true))
            }
            Err(error) => {
                debug!(?generator, "generator completed abruptly");
                payload.state = GeneratorState::Completed;
                Err(error)
            }
        }
    }
}

fn generator_receiver(vm: &VM, this: &Value, method: &str) -> Result<ObjectId> {
    match this {
        Value::Object(id) if vm.generator_state(*id).is_some() => Ok(*id),
        other => Err(Error::type_error(format!(
            "Generator.prototype.{} called on incompatible receiver {}",
            method,
            vm.describe(other)
        ))),
    }
}

/// `%GeneratorPrototype%.next`
pub(crate) fn generator_prototype_next(vm: &mut VM, this: &Value, arguments: &[Value], _captures: &[Value]) -> Result<Value> {
    let generator = generator_receiver(vm, this, "next")?;
    let value = arguments.first().cloned().unwrap_or_default();
    vm.generator_resume(generator, ResumeInput::Next(value))
}

/// `%GeneratorPrototype%.return`
pub(crate) fn generator_prototype_return(vm: &mut VM, this: &Value, arguments: &[Value], _captures: &[Value]) -> Result<Value> {
    let generator = generator_receiver(vm, this, "return")?;
    let value = arguments.first().cloned().unwrap_or_default();
    vm.generator_resume(generator, ResumeInput::Return(value))
}

/// `%GeneratorPrototype%.throw`
pub(crate) fn generator_prototype_throw(vm: &mut VM, this: &Value, arguments: &[Value], _captures: &[Value]) -> Result<Value> {
    let generator = generator_receiver(vm, this, "throw")?;
    let value = arguments.first().cloned().unwrap_or_default();
    vm.generator_resume(generator, ResumeInput::Throw(value))
}
