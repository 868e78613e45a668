//! Virtual machine state
//!
//! The [`VM`] owns the heap, the realm and the execution context stack.
//! Every evaluation entry point (ordinary calls, the tree-walking
//! interpreter, the bytecode loop) is an `impl VM` block spread over the
//! runtime and interpreter modules, so the context stack is threaded
//! explicitly rather than held in ambient state.

mod exec;
mod frame;

pub use exec::ExecutionResult;
pub use frame::FrameSnapshot;

use super::context::{ContextStack, ExecutionContext};
use super::object::{Object, ObjectKind, Property};
use super::realm::Realm;
use super::value::{PropertyKey, Value};
use crate::config::EngineConfig;
use crate::error::{must, Error, ErrorKind, StackTrace};
use crate::gc::{GcStats, Heap, ObjectId, Trace};
use tracing::debug;

/// The invocation engine's virtual machine
pub struct VM {
    /// Objects, environments and symbols
    pub heap: Heap,
    /// Intrinsics and global scope
    pub realm: Realm,
    /// Execution context stack; the bottom entry is the script context
    pub contexts: ContextStack,
    /// Engine configuration
    pub config: EngineConfig,
}

impl VM {
    /// Create a VM with its realm and a running script context
    pub fn new(config: EngineConfig) -> Self {
        let mut heap = Heap::new(config.gc.clone());
        let realm = Realm::create(&mut heap);
        // One extra slot for the script context so user code gets the full depth
        let mut contexts = ContextStack::new(config.max_call_depth.saturating_add(1));
        must(
            contexts.push(ExecutionContext::script(realm.global_environment, false)),
            "pushing the script context",
        );
        Self {
            heap,
            realm,
            contexts,
            config,
        }
    }

    /// The running execution context
    pub fn running_context(&self) -> &ExecutionContext {
        self.contexts.running()
    }

    /// The running execution context, mutably
    pub fn running_context_mut(&mut self) -> &mut ExecutionContext {
        self.contexts.running_mut()
    }

    /// Capture the current stack trace
    pub fn capture_stack_trace(&self) -> StackTrace {
        self.contexts.stack_trace()
    }

    /// Attach the current stack trace to an engine error that has none yet
    pub fn error_with_stack(&self, error: Error) -> Error {
        match &error {
            Error::RuntimeError { stack_trace, .. } if stack_trace.is_empty() => {
                error.with_stack_trace(self.capture_stack_trace())
            }
            _ => error,
        }
    }

    /// Allocate an error object with own `name` and `message` properties
    pub fn create_error(&mut self, kind: ErrorKind, message: &str) -> ObjectId {
        let mut object = Object::with_kind(
            ObjectKind::Error(kind),
            Some(self.realm.intrinsics.error_prototype),
        );
        object.define_property(PropertyKey::from("name"), Property::hidden(Value::from(kind.name())));
        object.define_property(PropertyKey::from("message"), Property::hidden(Value::from(message)));
        self.heap.allocate(object)
    }

    /// The language value an error completion carries
    pub fn error_to_value(&mut self, error: Error) -> Value {
        match error {
            Error::Thrown(value) => value,
            Error::RuntimeError {
                kind,
                message,
                stack_trace,
            } => {
                let id = self.create_error(kind, &message);
                if !stack_trace.is_empty() {
                    let stack = format!("{}: {}\n{}", kind, message, stack_trace);
                    self.heap
                        .get_mut(id)
                        .define_property(PropertyKey::from("stack"), Property::hidden(Value::from(stack)));
                }
                Value::Object(id)
            }
            other => {
                let message = other.to_string();
                Value::Object(self.create_error(ErrorKind::InternalError, &message))
            }
        }
    }

    /// Run a full collection
    ///
    /// Roots are the realm, every context on the stack and `extra`. Saved
    /// generator contexts are reached through their generator objects.
    pub fn collect_garbage(&mut self, extra: &[Value]) -> GcStats {
        let realm = self.realm;
        let contexts = &self.contexts;
        self.heap.collect(|visitor| {
            realm.trace(visitor);
            for context in contexts.iter() {
                context.trace(visitor);
            }
            visitor.visit_values(extra);
        });
        let stats = self.heap.stats().clone();
        debug!(collections = stats.collections, total_freed = stats.total_freed, "heap collected");
        stats
    }
}

impl Default for VM {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
