//! Promise capabilities and the async function bridge
//!
//! There is no job queue: resolving functions settle their promise
//! immediately and thenables are not unwrapped. An async body runs to
//! completion synchronously on a copy of the callee context, and its
//! completion drives the capability.

use super::context::ExecutionContext;
use super::dispatch::Completion;
use super::object::{BuiltinFn, NativeBehaviour, NativeFunction, Object, ObjectKind};
use super::value::{PropertyKey, Value};
use super::VM;
use crate::ast::FunctionNode;
use crate::error::{Error, ErrorKind, Result};
use crate::gc::{ObjectId, Trace, Visitor};

/// `[[PromiseState]]` together with its result
#[derive(Debug, Clone, PartialEq)]
pub enum PromiseState {
    Pending,
    Fulfilled(Value),
    Rejected(Value),
}

impl Trace for PromiseState {
    fn trace(&self, visitor: &mut Visitor) {
        match self {
            PromiseState::Pending => {}
            PromiseState::Fulfilled(value) | PromiseState::Rejected(value) => visitor.visit_value(value),
        }
    }
}

/// A pending promise and its resolving functions
#[derive(Debug, Clone, Copy)]
pub struct PromiseCapability {
    pub promise: ObjectId,
    pub resolve: ObjectId,
    pub reject: ObjectId,
}

impl PromiseCapability {
    /// Call the resolve function
    pub fn resolve(&self, vm: &mut VM, value: Value) -> Result<()> {
        vm.call(&Value::Object(self.resolve), Value::Undefined, vec![value])?;
        Ok(())
    }

    /// Call the reject function
    pub fn reject(&self, vm: &mut VM, reason: Value) -> Result<()> {
        vm.call(&Value::Object(self.reject), Value::Undefined, vec![reason])?;
        Ok(())
    }
}

const ALREADY_RESOLVED: &str = "alreadyResolved";

/// Captures: `[promise, shared record]`
fn resolving_captures(captures: &[Value]) -> Result<(ObjectId, ObjectId)> {
    match captures {
        [Value::Object(promise), Value::Object(record)] => Ok((*promise, *record)),
        _ => Err(Error::InternalError("malformed promise resolving function".to_string())),
    }
}

/// Set the shared already-resolved flag, reporting whether it was already set
fn test_and_set_resolved(vm: &mut VM, record: ObjectId) -> bool {
    let key = PropertyKey::from(ALREADY_RESOLVED);
    let object = vm.heap.get_mut(record);
    let already = object
        .get_own_property(&key)
        .is_some_and(|property| property.value.to_boolean());
    object.define_data_property(key, Value::Boolean(true));
    already
}

fn promise_resolve_function(vm: &mut VM, _this: &Value, arguments: &[Value], captures: &[Value]) -> Result<Value> {
    let (promise, record) = resolving_captures(captures)?;
    if test_and_set_resolved(vm, record) {
        return Ok(Value::Undefined);
    }
    let resolution = arguments.first().cloned().unwrap_or_default();
    let state = if resolution == Value::Object(promise) {
        let error = vm.create_error(ErrorKind::TypeError, "Chaining cycle detected for promise");
        PromiseState::Rejected(Value::Object(error))
    } else {
        PromiseState::Fulfilled(resolution)
    };
    vm.settle_promise(promise, state)?;
    Ok(Value::Undefined)
}

fn promise_reject_function(vm: &mut VM, _this: &Value, arguments: &[Value], captures: &[Value]) -> Result<Value> {
    let (promise, record) = resolving_captures(captures)?;
    if test_and_set_resolved(vm, record) {
        return Ok(Value::Undefined);
    }
    let reason = arguments.first().cloned().unwrap_or_default();
    vm.settle_promise(promise, PromiseState::Rejected(reason))?;
    Ok(Value::Undefined)
}

impl VM {
    /// NewPromiseCapability for the intrinsic promise constructor
    pub fn new_promise_capability(&mut self) -> PromiseCapability {
        let intrinsics = self.realm.intrinsics;
        let promise = self.heap.allocate(Object::with_kind(
            ObjectKind::Promise(PromiseState::Pending),
            Some(intrinsics.promise_prototype),
        ));
        let record = self.heap.allocate(Object::ordinary(None));
        let captures = vec![Value::Object(promise), Value::Object(record)];

        let mut resolving_function = |name: &str, behaviour: BuiltinFn| {
            self.heap.allocate(Object::with_kind(
                ObjectKind::NativeFunction(NativeFunction {
                    name: name.to_string(),
                    behaviour: NativeBehaviour::Builtin(behaviour),
                    captures: captures.clone(),
                }),
                Some(intrinsics.function_prototype),
            ))
        };
        let resolve = resolving_function("resolve", promise_resolve_function as BuiltinFn);
        let reject = resolving_function("reject", promise_reject_function as BuiltinFn);

        PromiseCapability {
            promise,
            resolve,
            reject,
        }
    }

    /// State of a promise object
    pub fn promise_state(&self, promise: ObjectId) -> Option<&PromiseState> {
        match &self.heap.get(promise).kind {
            ObjectKind::Promise(state) => Some(state),
            _ => None,
        }
    }

    fn settle_promise(&mut self, promise: ObjectId, state: PromiseState) -> Result<()> {
        match &mut self.heap.get_mut(promise).kind {
            ObjectKind::Promise(current) if *current == PromiseState::Pending => {
                *current = state;
                Ok(())
            }
            ObjectKind::Promise(_) => Err(Error::InternalError("promise settled twice".to_string())),
            _ => Err(Error::InternalError(format!("{:?} is not a promise", promise))),
        }
    }

    /// AsyncFunctionStart: run the body on a copy of the running context
    pub fn async_function_start(&mut self, capability: &PromiseCapability, node: &FunctionNode) -> Result<()> {
        let async_context = self.running_context().clone();
        self.async_block_start(capability, node, async_context)
    }

    /// AsyncBlockStart
    ///
    /// Language errors reject the capability; engine errors propagate.
    ///
    /// # Panics
    /// If the body leaves the context stack unbalanced
    pub fn async_block_start(
        &mut self,
        capability: &PromiseCapability,
        node: &FunctionNode,
        async_context: ExecutionContext,
    ) -> Result<()> {
        let depth = self.contexts.len();
        self.contexts.push(async_context)?;
        let result = self.evaluate_function_body(node);
        self.contexts.pop();
        assert_eq!(
            self.contexts.len(),
            depth,
            "async body left the execution context stack unbalanced"
        );

        match result {
            Ok(Completion::Return(value)) => capability.resolve(self, value),
            Ok(Completion::Normal(_)) => capability.resolve(self, Value::Undefined),
            Ok(completion) => unreachable!(
                "{} completion reached the top of an async body",
                completion.kind_name()
            ),
            Err(error) if error.is_engine_error() => Err(error),
            Err(error) => {
                let reason = self.error_to_value(error);
                capability.reject(self, reason)
            }
        }
    }

    /// Await: unwraps settled promises; other values pass through
    pub fn await_value(&mut self, value: Value) -> Result<Value> {
        if let Value::Object(id) = &value {
            if let Some(state) = self.promise_state(*id) {
                return match state {
                    PromiseState::Fulfilled(result) => Ok(result.clone()),
                    PromiseState::Rejected(reason) => Err(Error::Thrown(reason.clone())),
                    PromiseState::Pending => Err(Error::not_implemented("Awaiting a pending promise")),
                };
            }
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_settles_once() {
        let mut vm = VM::default();
        let capability = vm.new_promise_capability();
        capability.resolve(&mut vm, Value::from(1)).unwrap();
        capability.reject(&mut vm, Value::from(2)).unwrap();
        capability.resolve(&mut vm, Value::from(3)).unwrap();
        assert_eq!(
            vm.promise_state(capability.promise),
            Some(&PromiseState::Fulfilled(Value::from(1)))
        );
    }

    #[test]
    fn test_self_resolution_rejects_with_type_error() {
        let mut vm = VM::default();
        let capability = vm.new_promise_capability();
        capability
            .resolve(&mut vm, Value::Object(capability.promise))
            .unwrap();
        let Some(PromiseState::Rejected(Value::Object(error))) = vm.promise_state(capability.promise).cloned() else {
            panic!("expected a rejection");
        };
        assert!(matches!(vm.heap.get(error).kind, ObjectKind::Error(ErrorKind::TypeError)));
    }

    #[test]
    fn test_await_settled_and_plain_values() {
        let mut vm = VM::default();
        assert_eq!(vm.await_value(Value::from(4)).unwrap(), Value::from(4));

        let rejected = vm.new_promise_capability();
        rejected.reject(&mut vm, Value::from("no")).unwrap();
        let err = vm.await_value(Value::Object(rejected.promise)).unwrap_err();
        assert!(matches!(err, Error::Thrown(ref v) if *v == Value::from("no")));

        let pending = vm.new_promise_capability();
        let err = vm.await_value(Value::Object(pending.promise)).unwrap_err();
        assert!(matches!(err, Error::NotImplemented(_)));
    }
}
