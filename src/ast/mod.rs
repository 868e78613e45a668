//! Abstract Syntax Tree (AST) types for JavaScript
//!
//! This module defines the AST node types consumed by the invocation engine.
//! Nodes are produced by an external parser (or by [`builder`] in tests and
//! embedders) and shared through `Rc` between function objects and compiled
//! executables.

pub mod builder;
mod expr;
mod pattern;
pub mod scope;
mod stmt;

pub use expr::*;
pub use pattern::*;
pub use scope::{BlockScope, LexicalDeclaration, ScopeInfo};
pub use stmt::*;

use std::rc::Rc;

/// Kind of callable body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    /// Ordinary function
    Regular,
    /// `function*`
    Generator,
    /// `async function`
    Async,
}

/// Variable declaration kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// var declaration
    Var,
    /// let declaration
    Let,
    /// const declaration
    Const,
}

/// A single variable declarator (id = init)
#[derive(Debug, Clone)]
pub struct VariableDeclarator {
    /// The binding pattern
    pub id: Pattern,
    /// Optional initializer expression
    pub init: Option<Expression>,
}

/// A variable declaration (let x = 1, y = 2)
#[derive(Debug, Clone)]
pub struct VariableDeclaration {
    /// The kind of variable declaration
    pub kind: VariableKind,
    /// The declarators
    pub declarations: Vec<VariableDeclarator>,
}

/// Binding target of a formal parameter
#[derive(Debug, Clone)]
pub enum ParameterBinding {
    /// `a`
    Name(String),
    /// `{ a, b }` or `[a, b]`
    Pattern(Pattern),
}

/// A formal parameter
#[derive(Debug, Clone)]
pub struct FormalParameter {
    /// Binding target
    pub binding: ParameterBinding,
    /// Default value expression (`a = 1`)
    pub default_value: Option<Expression>,
    /// Rest parameter (`...a`)
    pub is_rest: bool,
}

impl FormalParameter {
    /// Plain `name` parameter
    pub fn simple(name: impl Into<String>) -> Self {
        Self {
            binding: ParameterBinding::Name(name.into()),
            default_value: None,
            is_rest: false,
        }
    }

    /// Names bound by this parameter, in source order
    pub fn bound_names(&self) -> Vec<&str> {
        match &self.binding {
            ParameterBinding::Name(name) => vec![name.as_str()],
            ParameterBinding::Pattern(pattern) => pattern.bound_names(),
        }
    }

    /// Whether evaluating this parameter may run user code
    pub fn contains_expression(&self) -> bool {
        if self.default_value.is_some() {
            return true;
        }
        match &self.binding {
            ParameterBinding::Name(_) => false,
            ParameterBinding::Pattern(pattern) => pattern.contains_expression(),
        }
    }
}

/// Function body - either a statement list or a single expression (for arrows)
#[derive(Debug, Clone)]
pub enum FunctionBody {
    /// Block statement body
    Block(Vec<Statement>),
    /// Expression body (arrow functions only)
    Expression(Expression),
}

/// A function (declaration, expression, arrow, method, or class constructor)
#[derive(Debug, Clone)]
pub struct FunctionNode {
    /// Function name (empty for anonymous functions)
    pub name: String,
    /// Formal parameters in order
    pub parameters: Vec<FormalParameter>,
    /// Function body
    pub body: FunctionBody,
    /// Regular, generator or async
    pub kind: FunctionKind,
    /// Arrow function
    pub is_arrow: bool,
    /// Strict mode code (explicit flag or a "use strict" directive)
    pub is_strict: bool,
    /// ExpectedArgumentCount: parameters before the first default or rest
    pub function_length: usize,
    /// Static scope facts about the body
    pub scope: ScopeInfo,
}

impl FunctionNode {
    /// Create a function node, running scope analysis over its body
    pub fn new(
        name: impl Into<String>,
        parameters: Vec<FormalParameter>,
        body: FunctionBody,
        kind: FunctionKind,
        is_arrow: bool,
        is_strict: bool,
    ) -> Self {
        let is_strict = is_strict || has_use_strict_directive(&body);
        let function_length = parameters
            .iter()
            .take_while(|p| p.default_value.is_none() && !p.is_rest)
            .count();
        let scope = ScopeInfo::analyze(&parameters, &body);
        Self {
            name: name.into(),
            parameters,
            body,
            kind,
            is_arrow,
            is_strict,
            function_length,
            scope,
        }
    }

    /// Statements of a block body (empty for expression bodies)
    pub fn statements(&self) -> &[Statement] {
        match &self.body {
            FunctionBody::Block(statements) => statements,
            FunctionBody::Expression(_) => &[],
        }
    }
}

/// A script: the top-level statement list evaluated against the global environment
#[derive(Debug, Clone)]
pub struct Script {
    /// Top-level statements
    pub statements: Vec<Statement>,
    /// Starts with a "use strict" directive
    pub is_strict: bool,
    /// Top-level declarations
    pub scope: ScopeInfo,
}

impl Script {
    /// Analyze a top-level statement list
    pub fn new(statements: Vec<Statement>) -> Self {
        let body = FunctionBody::Block(statements);
        let scope = ScopeInfo::analyze(&[], &body);
        let is_strict = has_use_strict_directive(&body);
        let FunctionBody::Block(statements) = body else {
            unreachable!("script body is always a block")
        };
        Self {
            statements,
            is_strict,
            scope,
        }
    }
}

fn has_use_strict_directive(body: &FunctionBody) -> bool {
    match body {
        FunctionBody::Block(statements) => matches!(
            statements.first(),
            Some(Statement::Expression(Expression::Literal(Literal::String(s)))) if s == "use strict"
        ),
        FunctionBody::Expression(_) => false,
    }
}

/// A class definition
#[derive(Debug, Clone)]
pub struct ClassNode {
    /// Optional class name
    pub name: Option<String>,
    /// Superclass expression
    pub super_class: Option<Expression>,
    /// Explicit constructor
    pub constructor: Option<Rc<FunctionNode>>,
    /// Methods
    pub methods: Vec<ClassMethod>,
    /// Instance fields
    pub fields: Vec<ClassField>,
}

/// A method definition in a class
#[derive(Debug, Clone)]
pub struct ClassMethod {
    /// Method key
    pub key: String,
    /// Method value (function)
    pub function: Rc<FunctionNode>,
    /// Is this a static method?
    pub is_static: bool,
}

/// An instance field definition in a class
#[derive(Debug, Clone)]
pub struct ClassField {
    /// Field key
    pub key: PropertyName,
    /// Initializer expression
    pub value: Option<Expression>,
}

/// Property key in object literals, patterns and classes
#[derive(Debug, Clone)]
pub enum PropertyName {
    /// `key`
    Identifier(String),
    /// `[expr]`
    Computed(Box<Expression>),
}

impl PropertyName {
    /// The static key, if not computed
    pub fn as_static(&self) -> Option<&str> {
        match self {
            PropertyName::Identifier(name) => Some(name),
            PropertyName::Computed(_) => None,
        }
    }
}
