//! Error types for the invocation engine

use crate::runtime::Value;
use std::fmt;
use thiserror::Error;

/// A single frame in a JavaScript stack trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Function name (or `"<anonymous>"` for anonymous functions)
    pub function_name: String,
    /// Whether this is a native function
    pub is_native: bool,
}

impl StackFrame {
    /// Create a new stack frame
    pub fn new(function_name: impl Into<String>) -> Self {
        let function_name = function_name.into();
        Self {
            function_name: if function_name.is_empty() {
                "<anonymous>".to_string()
            } else {
                function_name
            },
            is_native: false,
        }
    }

    /// Create a stack frame for a native function
    pub fn native(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            is_native: true,
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_native {
            write!(f, "    at {} (native)", self.function_name)
        } else {
            write!(f, "    at {}", self.function_name)
        }
    }
}

/// A JavaScript stack trace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackTrace {
    /// Stack frames from innermost to outermost
    pub frames: Vec<StackFrame>,
}

impl StackTrace {
    /// Create an empty stack trace
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Add a frame to the stack trace
    pub fn push(&mut self, frame: StackFrame) {
        self.frames.push(frame);
    }

    /// Check if the stack trace is empty
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in &self.frames {
            writeln!(f, "{}", frame)?;
        }
        Ok(())
    }
}

/// Main error type for the engine
///
/// Every abrupt "throw" completion travels as an `Err` of this type; the
/// language-visible value is recovered with `VM::error_to_value`.
#[derive(Error, Debug, Clone)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// Runtime error - TypeError, ReferenceError, etc.
    #[error("{kind}: {message}{}", if stack_trace.is_empty() { String::new() } else { format!("\n{}", stack_trace) })]
    RuntimeError {
        kind: ErrorKind,
        message: String,
        stack_trace: StackTrace,
    },

    /// A value thrown by user code
    #[error("Uncaught {0}")]
    Thrown(Value),

    /// A request the current execution strategy cannot serve
    #[error("InternalError: Not implemented: {0}")]
    NotImplemented(String),

    /// Internal engine error
    #[error("InternalError: {0}")]
    InternalError(String),
}

/// JavaScript error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
pub enum ErrorKind {
    /// TypeError - wrong type for operation
    TypeError,
    /// ReferenceError - undefined or uninitialized binding
    ReferenceError,
    /// RangeError - value out of range
    RangeError,
    /// SyntaxError - invalid syntax detected at runtime
    SyntaxError,
    /// Generic Error - user-thrown Error objects
    GenericError,
    /// InternalError - internal engine error
    InternalError,
}

impl ErrorKind {
    /// The `name` an error object of this kind carries
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::GenericError => "Error",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Error {
    fn runtime(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error::RuntimeError {
            kind,
            message: message.into(),
            stack_trace: StackTrace::new(),
        }
    }

    /// Create a TypeError
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::runtime(ErrorKind::TypeError, message)
    }

    /// Create a ReferenceError
    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::runtime(ErrorKind::ReferenceError, message)
    }

    /// Create a RangeError
    pub fn range_error(message: impl Into<String>) -> Self {
        Self::runtime(ErrorKind::RangeError, message)
    }

    /// Create a SyntaxError
    pub fn syntax_error(message: impl Into<String>) -> Self {
        Self::runtime(ErrorKind::SyntaxError, message)
    }

    /// Create a "not implemented" error for an unsupported strategy/kind combination
    pub fn not_implemented(what: impl Into<String>) -> Self {
        Error::NotImplemented(what.into())
    }

    /// Add stack trace to an existing error
    pub fn with_stack_trace(self, stack_trace: StackTrace) -> Self {
        match self {
            Error::RuntimeError { kind, message, .. } => Error::RuntimeError {
                kind,
                message,
                stack_trace,
            },
            other => other,
        }
    }

    /// The error kind, if this is an engine-created language error
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::RuntimeError { kind, .. } => Some(*kind),
            Error::NotImplemented(_) | Error::InternalError(_) => Some(ErrorKind::InternalError),
            Error::Thrown(_) => None,
        }
    }

    /// Whether this is a TypeError
    pub fn is_type_error(&self) -> bool {
        self.kind() == Some(ErrorKind::TypeError)
    }

    /// Whether this is a ReferenceError
    pub fn is_reference_error(&self) -> bool {
        self.kind() == Some(ErrorKind::ReferenceError)
    }

    /// Engine-level failures that user code cannot catch
    pub fn is_engine_error(&self) -> bool {
        matches!(self, Error::NotImplemented(_) | Error::InternalError(_))
    }
}

/// Result type alias for the engine
pub type Result<T> = std::result::Result<T, Error>;

/// Unwrap a result that static analysis guarantees to be `Ok`.
///
/// A failure here is an engine bug, never a user-code fault, so it aborts.
#[track_caller]
pub fn must<T>(result: Result<T>, operation: &str) -> T {
    match result {
        Ok(value) => value,
        Err(error) => panic!("invariant violated during {}: {}", operation, error),
    }
}

/// Standardized error message templates
pub mod messages {
    pub const NOT_A_FUNCTION: &str = "is not a function";
    pub const NOT_AN_OBJECT: &str = "is not an object";
    pub const NOT_A_CONSTRUCTOR: &str = "is not a constructor";
    pub const NOT_ITERABLE: &str = "is not iterable";

    pub const IS_NOT_DEFINED: &str = "is not defined";
    pub const MAXIMUM_CALL_STACK: &str = "Maximum call stack size exceeded";

    pub const CLASS_CONSTRUCTOR_WITHOUT_NEW: &str = "class constructor cannot be invoked without new";
    pub const DERIVED_CONSTRUCTOR_RETURNING_INVALID_VALUE: &str =
        "Derived constructor return value is not an object or undefined";
    pub const SUPER_CALL_REQUIRED: &str =
        "Must call super constructor in derived class before accessing 'this' or returning from derived constructor";
    pub const SUPER_CALL_TWICE: &str = "Super constructor may only be called once";
    pub const CALLEE_ACCESS: &str =
        "'caller', 'callee', and 'arguments' properties may not be accessed on strict mode functions or the arguments objects for calls to them";

    /// Format a "X is not a function" error message
    pub fn not_a_function(name: &str) -> String {
        format!("'{}' {}", name, NOT_A_FUNCTION)
    }

    /// Format a "X is not a constructor" error message
    pub fn not_a_constructor(name: &str) -> String {
        format!("'{}' {}", name, NOT_A_CONSTRUCTOR)
    }

    /// Format a "X is not iterable" error message
    pub fn not_iterable(name: &str) -> String {
        format!("'{}' {}", name, NOT_ITERABLE)
    }

    /// Format a "X is not defined" error message
    pub fn not_defined(name: &str) -> String {
        format!("'{}' {}", name, IS_NOT_DEFINED)
    }

    /// Format a "Cannot access 'X' before initialization" error message
    pub fn before_initialization(name: &str) -> String {
        format!("Cannot access '{}' before initialization", name)
    }

    /// Format an "Assignment to constant variable 'X'" error message
    pub fn assignment_to_constant(name: &str) -> String {
        format!("Assignment to constant variable '{}'", name)
    }

    /// Format an "Identifier 'X' has already been declared" error message
    pub fn already_declared(name: &str) -> String {
        format!("Identifier '{}' has already been declared", name)
    }

    /// Format a "Cannot read property 'X' of Y" error message
    pub fn cannot_read_property(prop: &str, of: &str) -> String {
        format!("Cannot read property '{}' of {}", prop, of)
    }

    /// Format a "Cannot assign to read only property 'X'" error message
    pub fn read_only_property(prop: &str) -> String {
        format!("Cannot assign to read only property '{}'", prop)
    }
}
