//! Execution contexts and the context stack

use super::environment::PrivateEnvironment;
use super::value::Value;
use crate::error::{messages, Error, Result, StackFrame, StackTrace};
use crate::gc::{EnvironmentId, ObjectId, Trace, Visitor};
use std::rc::Rc;

/// One in-flight invocation (or script evaluation)
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Active function; `None` for script code
    pub function: Option<ObjectId>,
    /// Name used in stack traces
    pub function_name: String,
    pub lexical_environment: EnvironmentId,
    pub variable_environment: EnvironmentId,
    pub private_environment: Option<Rc<PrivateEnvironment>>,
    /// Argument vector of the call
    pub arguments: Vec<Value>,
    pub is_strict: bool,
    /// Block-level function names hoisted into the variable environment in sloppy code
    pub annex_b_function_names: Vec<String>,
}

impl ExecutionContext {
    /// Context for script code running against `global_environment`
    pub fn script(global_environment: EnvironmentId, is_strict: bool) -> Self {
        Self {
            function: None,
            function_name: String::new(),
            lexical_environment: global_environment,
            variable_environment: global_environment,
            private_environment: None,
            arguments: Vec::new(),
            is_strict,
            annex_b_function_names: Vec::new(),
        }
    }
}

impl Trace for ExecutionContext {
    fn trace(&self, visitor: &mut Visitor) {
        if let Some(function) = self.function {
            visitor.visit_object(function);
        }
        visitor.visit_environment(self.lexical_environment);
        visitor.visit_environment(self.variable_environment);
        visitor.visit_values(&self.arguments);
    }
}

/// Strictly nested stack of execution contexts
#[derive(Debug)]
pub struct ContextStack {
    contexts: Vec<ExecutionContext>,
    max_depth: usize,
}

impl ContextStack {
    /// Create an empty stack
    pub fn new(max_depth: usize) -> Self {
        Self {
            contexts: Vec::new(),
            max_depth,
        }
    }

    /// Push a context; a full stack is a RangeError and leaves the stack untouched
    pub fn push(&mut self, context: ExecutionContext) -> Result<()> {
        if self.contexts.len() >= self.max_depth {
            return Err(Error::range_error(messages::MAXIMUM_CALL_STACK));
        }
        self.contexts.push(context);
        Ok(())
    }

    /// Pop the running context
    ///
    /// # Panics
    /// If the stack is empty
    pub fn pop(&mut self) -> ExecutionContext {
        match self.contexts.pop() {
            Some(context) => context,
            None => panic!("execution context stack underflow"),
        }
    }

    /// The running context
    ///
    /// # Panics
    /// If the stack is empty
    pub fn running(&self) -> &ExecutionContext {
        match self.contexts.last() {
            Some(context) => context,
            None => panic!("no running execution context"),
        }
    }

    /// The running context, mutably
    pub fn running_mut(&mut self) -> &mut ExecutionContext {
        match self.contexts.last_mut() {
            Some(context) => context,
            None => panic!("no running execution context"),
        }
    }

    /// Depth of the stack
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Whether no context is active
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Contexts from outermost to innermost
    pub fn iter(&self) -> impl Iterator<Item = &ExecutionContext> {
        self.contexts.iter()
    }

    /// Function frames, innermost first
    pub fn stack_trace(&self) -> StackTrace {
        let mut trace = StackTrace::new();
        for context in self.contexts.iter().rev() {
            if context.function.is_some() {
                trace.push(StackFrame::new(context.function_name.clone()));
            }
        }
        trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::Heap;
    use crate::runtime::Environment;

    fn global_env() -> EnvironmentId {
        let mut heap = Heap::default();
        heap.allocate_environment(Environment::declarative(None))
    }

    #[test]
    fn test_push_pop() {
        let env = global_env();
        let mut stack = ContextStack::new(4);
        stack.push(ExecutionContext::script(env, false)).unwrap();
        let mut strict = ExecutionContext::script(env, true);
        strict.function_name = "inner".to_string();
        stack.push(strict).unwrap();

        assert_eq!(stack.len(), 2);
        assert!(stack.running().is_strict);
        assert!(stack.pop().is_strict);
        assert!(!stack.running().is_strict);
    }

    #[test]
    fn test_depth_limit() {
        let env = global_env();
        let mut stack = ContextStack::new(1);
        stack.push(ExecutionContext::script(env, false)).unwrap();
        let err = stack.push(ExecutionContext::script(env, false)).unwrap_err();
        assert_eq!(err.kind(), Some(crate::error::ErrorKind::RangeError));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn test_pop_empty_panics() {
        ContextStack::new(1).pop();
    }
}
