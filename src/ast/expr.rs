//! Expression AST node types

use super::*;

/// A JavaScript expression
#[derive(Debug, Clone)]
pub enum Expression {
    /// Literal value
    Literal(Literal),

    /// Identifier reference
    Identifier(String),

    /// this
    This,

    /// Array literal [a, b, c]
    Array(Vec<Expression>),

    /// Object literal {a: 1, b: 2}
    Object(Vec<ObjectProperty>),

    /// Function or arrow function expression
    Function(Rc<FunctionNode>),

    /// Class expression
    Class(Rc<ClassNode>),

    /// Unary expression -x, !x, typeof x, void x
    Unary(UnaryOperator, Box<Expression>),

    /// Binary expression a + b
    Binary(BinaryOperator, Box<Expression>, Box<Expression>),

    /// Assignment a = b, a.b = c
    Assignment(Box<AssignmentExpression>),

    /// Member access a.b, a[b]
    Member(Box<MemberExpression>),

    /// Function call f(a)
    Call(Box<CallExpression>),

    /// new C(a)
    New(Box<CallExpression>),

    /// super(a)
    SuperCall(Vec<Argument>),

    /// yield a
    Yield(Option<Box<Expression>>),

    /// await a
    Await(Box<Expression>),
}

/// Literal values
#[derive(Debug, Clone)]
pub enum Literal {
    /// undefined
    Undefined,
    /// null
    Null,
    /// true / false
    Boolean(bool),
    /// 42
    Number(f64),
    /// "hello"
    String(String),
}

/// Object literal property
#[derive(Debug, Clone)]
pub struct ObjectProperty {
    /// Property key
    pub key: PropertyName,
    /// Property value
    pub value: Expression,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// -
    Minus,
    /// !
    Not,
    /// typeof
    Typeof,
    /// void
    Void,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// +
    Add,
    /// -
    Sub,
    /// *
    Mul,
    /// /
    Div,
    /// <
    Lt,
    /// >
    Gt,
    /// <=
    LtEq,
    /// >=
    GtEq,
    /// ===
    StrictEq,
    /// !==
    StrictNe,
}

/// Assignment target
#[derive(Debug, Clone)]
pub enum AssignmentTarget {
    /// x = ...
    Identifier(String),
    /// a.b = ... / a[b] = ...
    Member(MemberExpression),
}

/// Assignment expression
#[derive(Debug, Clone)]
pub struct AssignmentExpression {
    /// Left-hand side
    pub target: AssignmentTarget,
    /// Right-hand side
    pub value: Expression,
}

/// Member expression
#[derive(Debug, Clone)]
pub struct MemberExpression {
    /// Object being accessed
    pub object: Expression,
    /// Property being accessed
    pub property: MemberProperty,
}

/// Property part of a member expression
#[derive(Debug, Clone)]
pub enum MemberProperty {
    /// a.b
    Named(String),
    /// a[b]
    Computed(Expression),
}

/// Call or `new` expression
#[derive(Debug, Clone)]
pub struct CallExpression {
    /// The callee
    pub callee: Expression,
    /// Arguments
    pub arguments: Vec<Argument>,
}

/// A call argument
#[derive(Debug, Clone)]
pub enum Argument {
    /// f(a)
    Expression(Expression),
    /// f(...a)
    Spread(Expression),
}

impl Argument {
    /// The argument expression
    pub fn expression(&self) -> &Expression {
        match self {
            Argument::Expression(e) | Argument::Spread(e) => e,
        }
    }
}
