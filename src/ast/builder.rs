//! Terse constructors for AST nodes
//!
//! The engine consumes already-parsed trees. Embedders that produce trees
//! themselves, and the test suite, build them with these helpers:
//!
//! ```
//! use invoke_js::ast::builder::*;
//!
//! // function add(a, b) { return a + b; }
//! let add = function("add", &["a", "b"], vec![ret(add_(ident("a"), ident("b")))]);
//! assert_eq!(add.function_length, 2);
//! ```

use super::*;

// Expressions

/// Identifier reference
pub fn ident(name: &str) -> Expression {
    Expression::Identifier(name.to_string())
}

/// Number literal
pub fn num(value: f64) -> Expression {
    Expression::Literal(Literal::Number(value))
}

/// String literal
pub fn str_(value: &str) -> Expression {
    Expression::Literal(Literal::String(value.to_string()))
}

/// Boolean literal
pub fn bool_(value: bool) -> Expression {
    Expression::Literal(Literal::Boolean(value))
}

/// `undefined`
pub fn undefined() -> Expression {
    Expression::Literal(Literal::Undefined)
}

/// `null`
pub fn null() -> Expression {
    Expression::Literal(Literal::Null)
}

/// `this`
pub fn this() -> Expression {
    Expression::This
}

/// `[a, b, c]`
pub fn array(elements: Vec<Expression>) -> Expression {
    Expression::Array(elements)
}

/// `{ key: value, ... }`
pub fn object(properties: Vec<(&str, Expression)>) -> Expression {
    Expression::Object(
        properties
            .into_iter()
            .map(|(key, value)| ObjectProperty {
                key: PropertyName::Identifier(key.to_string()),
                value,
            })
            .collect(),
    )
}

/// `object.name`
pub fn member(object: Expression, name: &str) -> Expression {
    Expression::Member(Box::new(MemberExpression {
        object,
        property: MemberProperty::Named(name.to_string()),
    }))
}

/// `object[key]`
pub fn index(object: Expression, key: Expression) -> Expression {
    Expression::Member(Box::new(MemberExpression {
        object,
        property: MemberProperty::Computed(key),
    }))
}

/// `callee(args...)`
pub fn call(callee: Expression, arguments: Vec<Expression>) -> Expression {
    call_with(callee, arguments.into_iter().map(Argument::Expression).collect())
}

/// `callee(...)` with explicit argument kinds
pub fn call_with(callee: Expression, arguments: Vec<Argument>) -> Expression {
    Expression::Call(Box::new(CallExpression { callee, arguments }))
}

/// `...expr` argument
pub fn spread(expr: Expression) -> Argument {
    Argument::Spread(expr)
}

/// `new callee(args...)`
pub fn new_(callee: Expression, arguments: Vec<Expression>) -> Expression {
    Expression::New(Box::new(CallExpression {
        callee,
        arguments: arguments.into_iter().map(Argument::Expression).collect(),
    }))
}

/// `super(args...)`
pub fn super_call(arguments: Vec<Expression>) -> Expression {
    Expression::SuperCall(arguments.into_iter().map(Argument::Expression).collect())
}

/// `name = value`
pub fn assign(name: &str, value: Expression) -> Expression {
    Expression::Assignment(Box::new(AssignmentExpression {
        target: AssignmentTarget::Identifier(name.to_string()),
        value,
    }))
}

/// `object.name = value`
pub fn assign_member(object: Expression, name: &str, value: Expression) -> Expression {
    Expression::Assignment(Box::new(AssignmentExpression {
        target: AssignmentTarget::Member(MemberExpression {
            object,
            property: MemberProperty::Named(name.to_string()),
        }),
        value,
    }))
}

/// `object[key] = value`
pub fn assign_index(object: Expression, key: Expression, value: Expression) -> Expression {
    Expression::Assignment(Box::new(AssignmentExpression {
        target: AssignmentTarget::Member(MemberExpression {
            object,
            property: MemberProperty::Computed(key),
        }),
        value,
    }))
}

/// Binary expression
pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Expression {
    Expression::Binary(op, Box::new(left), Box::new(right))
}

/// `left + right`
pub fn add_(left: Expression, right: Expression) -> Expression {
    binary(BinaryOperator::Add, left, right)
}

/// `left - right`
pub fn sub_(left: Expression, right: Expression) -> Expression {
    binary(BinaryOperator::Sub, left, right)
}

/// `left * right`
pub fn mul_(left: Expression, right: Expression) -> Expression {
    binary(BinaryOperator::Mul, left, right)
}

/// `left < right`
pub fn lt(left: Expression, right: Expression) -> Expression {
    binary(BinaryOperator::Lt, left, right)
}

/// `left === right`
pub fn strict_eq(left: Expression, right: Expression) -> Expression {
    binary(BinaryOperator::StrictEq, left, right)
}

/// `typeof operand`
pub fn typeof_(operand: Expression) -> Expression {
    Expression::Unary(UnaryOperator::Typeof, Box::new(operand))
}

/// `!operand`
pub fn not(operand: Expression) -> Expression {
    Expression::Unary(UnaryOperator::Not, Box::new(operand))
}

/// `-operand`
pub fn neg(operand: Expression) -> Expression {
    Expression::Unary(UnaryOperator::Minus, Box::new(operand))
}

/// `yield` / `yield value`
pub fn yield_(value: Option<Expression>) -> Expression {
    Expression::Yield(value.map(Box::new))
}

/// `await value`
pub fn await_(value: Expression) -> Expression {
    Expression::Await(Box::new(value))
}

/// Function expression from a node
pub fn func_expr(node: Rc<FunctionNode>) -> Expression {
    Expression::Function(node)
}

/// Class expression
pub fn class_expr(class: ClassNode) -> Expression {
    Expression::Class(Rc::new(class))
}

/// Arrow function expression over simple parameters
pub fn arrow(params: &[&str], body: FunctionBody) -> Expression {
    Expression::Function(Rc::new(FunctionNode::new(
        "",
        simple_params(params),
        body,
        FunctionKind::Regular,
        true,
        false,
    )))
}

/// Concise arrow body
pub fn expr_body(expr: Expression) -> FunctionBody {
    FunctionBody::Expression(expr)
}

/// Block body
pub fn block_body(statements: Vec<Statement>) -> FunctionBody {
    FunctionBody::Block(statements)
}

// Patterns and parameters

/// Plain parameter
pub fn param(name: &str) -> FormalParameter {
    FormalParameter::simple(name)
}

/// `name = default`
pub fn param_default(name: &str, default: Expression) -> FormalParameter {
    FormalParameter {
        binding: ParameterBinding::Name(name.to_string()),
        default_value: Some(default),
        is_rest: false,
    }
}

/// `...name`
pub fn rest_param(name: &str) -> FormalParameter {
    FormalParameter {
        binding: ParameterBinding::Name(name.to_string()),
        default_value: None,
        is_rest: true,
    }
}

/// Destructuring parameter
pub fn pattern_param(pattern: Pattern) -> FormalParameter {
    FormalParameter {
        binding: ParameterBinding::Pattern(pattern),
        default_value: None,
        is_rest: false,
    }
}

/// `[a, b]` pattern
pub fn array_pattern(names: &[&str]) -> Pattern {
    Pattern::Array(ArrayPattern {
        elements: names
            .iter()
            .map(|n| Some(Pattern::Identifier(n.to_string())))
            .collect(),
        rest: None,
    })
}

/// `{ a, b }` pattern
pub fn object_pattern(names: &[&str]) -> Pattern {
    Pattern::Object(ObjectPattern {
        properties: names
            .iter()
            .map(|n| ObjectPatternProperty {
                key: PropertyName::Identifier(n.to_string()),
                value: Pattern::Identifier(n.to_string()),
            })
            .collect(),
        rest: None,
    })
}

fn simple_params(params: &[&str]) -> Vec<FormalParameter> {
    params.iter().map(|p| FormalParameter::simple(*p)).collect()
}

// Statements

/// Expression statement
pub fn expr(expr: Expression) -> Statement {
    Statement::Expression(expr)
}

fn declaration(kind: VariableKind, name: &str, init: Option<Expression>) -> Statement {
    Statement::VariableDeclaration(VariableDeclaration {
        kind,
        declarations: vec![VariableDeclarator {
            id: Pattern::Identifier(name.to_string()),
            init,
        }],
    })
}

/// `var name = init`
pub fn var(name: &str, init: Option<Expression>) -> Statement {
    declaration(VariableKind::Var, name, init)
}

/// `let name = init`
pub fn let_(name: &str, init: Option<Expression>) -> Statement {
    declaration(VariableKind::Let, name, init)
}

/// `const name = init`
pub fn const_(name: &str, init: Expression) -> Statement {
    declaration(VariableKind::Const, name, Some(init))
}

/// `return value`
pub fn ret(value: Expression) -> Statement {
    Statement::Return(Some(value))
}

/// `return`
pub fn ret_void() -> Statement {
    Statement::Return(None)
}

/// `throw value`
pub fn throw(value: Expression) -> Statement {
    Statement::Throw(value)
}

/// `{ ... }`
pub fn block(statements: Vec<Statement>) -> Statement {
    Statement::Block(Block::new(statements))
}

/// `if (test) consequent else alternate`
pub fn if_(test: Expression, consequent: Statement, alternate: Option<Statement>) -> Statement {
    Statement::If(Box::new(IfStatement {
        test,
        consequent,
        alternate,
    }))
}

/// `while (test) body`
pub fn while_(test: Expression, body: Statement) -> Statement {
    Statement::While(Box::new(WhileStatement { test, body }))
}

/// `break`
pub fn break_() -> Statement {
    Statement::Break
}

/// `continue`
pub fn continue_() -> Statement {
    Statement::Continue
}

/// `function name(params) { body }` as a statement
pub fn function_declaration(name: &str, params: &[&str], body: Vec<Statement>) -> Statement {
    Statement::FunctionDeclaration(function(name, params, body))
}

/// `class ...` as a statement
pub fn class_declaration(class: ClassNode) -> Statement {
    Statement::ClassDeclaration(Rc::new(class))
}

// Functions

/// Sloppy-mode ordinary function
pub fn function(name: &str, params: &[&str], body: Vec<Statement>) -> Rc<FunctionNode> {
    function_with(name, simple_params(params), body, FunctionKind::Regular, false)
}

/// Strict-mode ordinary function
pub fn strict_function(name: &str, params: &[&str], body: Vec<Statement>) -> Rc<FunctionNode> {
    function_with(name, simple_params(params), body, FunctionKind::Regular, true)
}

/// `function* name(params) { body }`
pub fn generator(name: &str, params: &[&str], body: Vec<Statement>) -> Rc<FunctionNode> {
    function_with(name, simple_params(params), body, FunctionKind::Generator, false)
}

/// `async function name(params) { body }`
pub fn async_function(name: &str, params: &[&str], body: Vec<Statement>) -> Rc<FunctionNode> {
    function_with(name, simple_params(params), body, FunctionKind::Async, false)
}

/// Function with full control over parameters, kind and strictness
pub fn function_with(
    name: &str,
    parameters: Vec<FormalParameter>,
    body: Vec<Statement>,
    kind: FunctionKind,
    is_strict: bool,
) -> Rc<FunctionNode> {
    Rc::new(FunctionNode::new(
        name,
        parameters,
        FunctionBody::Block(body),
        kind,
        false,
        is_strict,
    ))
}

/// `class name extends super_class {}`; extend with the chained methods below
pub fn class(name: &str, super_class: Option<Expression>) -> ClassNode {
    ClassNode {
        name: (!name.is_empty()).then(|| name.to_string()),
        super_class,
        constructor: None,
        methods: Vec::new(),
        fields: Vec::new(),
    }
}

impl ClassNode {
    /// Explicit `constructor(params) { body }`
    pub fn with_constructor(mut self, params: &[&str], body: Vec<Statement>) -> Self {
        let name = self.name.clone().unwrap_or_default();
        self.constructor = Some(strict_function(&name, params, body));
        self
    }

    /// Prototype method
    pub fn with_method(mut self, key: &str, params: &[&str], body: Vec<Statement>) -> Self {
        self.methods.push(ClassMethod {
            key: key.to_string(),
            function: strict_function(key, params, body),
            is_static: false,
        });
        self
    }

    /// Static method
    pub fn with_static_method(mut self, key: &str, params: &[&str], body: Vec<Statement>) -> Self {
        self.methods.push(ClassMethod {
            key: key.to_string(),
            function: strict_function(key, params, body),
            is_static: true,
        });
        self
    }

    /// Instance field `key = value`
    pub fn with_field(mut self, key: &str, value: Option<Expression>) -> Self {
        self.fields.push(ClassField {
            key: PropertyName::Identifier(key.to_string()),
            value,
        });
        self
    }
}
