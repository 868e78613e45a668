//! invoke-js: the function-invocation core of a JavaScript engine
//!
//! invoke-js implements what happens when a JavaScript function is called or
//! constructed: execution contexts and environment records, `this` binding,
//! FunctionDeclarationInstantiation (parameters, `arguments`, hoisting),
//! class constructors and `super(...)`, and the evaluation of function
//! bodies by either a tree-walking interpreter or a bytecode compiler and
//! interpreter. Generator and async functions are bridged onto those two
//! strategies.
//!
//! # Quick Start
//!
//! ```
//! use invoke_js::ast::builder::*;
//! use invoke_js::ast::Script;
//! use invoke_js::{Runtime, Value};
//!
//! fn main() -> invoke_js::Result<()> {
//!     let mut runtime = Runtime::new();
//!     let script = Script::new(vec![
//!         function_declaration("add", &["a", "b"], vec![ret(add_(ident("a"), ident("b")))]),
//!         expr(call(ident("add"), vec![num(1.0), num(2.0)])),
//!     ]);
//!     assert_eq!(runtime.run_script(&script)?, Value::from(3));
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! Programs arrive as [`ast`] nodes (there is no parser). [`runtime`] owns the
//! invocation protocol; bodies run through [`interpreter`] or [`bytecode`]
//! according to [`EngineConfig::strategy`].
//!
//! | Category | Modules |
//! |----------|---------|
//! | **Core** | [`ast`], [`runtime`], [`error`](Error) |
//! | **Evaluation** | [`interpreter`], [`bytecode`] |
//! | **Memory** | [`gc`] |
//! | **Embedding** | [`config`] |
// Clippy configuration for invoke-js.
//
// These suppressions exist because:
// - too_many_arguments: class and function creation mirror the abstract operations' parameters
// - new_without_default: Some types have required initialization logic
// - enum_variant_names: Opcode/AST variants follow JS naming conventions
#![allow(clippy::too_many_arguments)]
#![allow(clippy::new_without_default)]
#![allow(clippy::enum_variant_names)]

pub mod ast;
pub mod bytecode;
pub mod config;
pub mod gc;
pub mod interpreter;
pub mod runtime;

mod error;

pub use config::{EngineConfig, ExecutionStrategy};
pub use error::{messages, Error, ErrorKind, Result, StackFrame, StackTrace};
pub use runtime::{ObjectKind, PropertyKey, Runtime, Value};

/// Version of invoke-js
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
