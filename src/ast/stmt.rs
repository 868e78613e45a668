//! Statement AST node types

use super::*;

/// A JavaScript statement
#[derive(Debug, Clone)]
pub enum Statement {
    /// Empty statement ;
    Empty,

    /// Expression statement
    Expression(Expression),

    /// Variable declaration
    VariableDeclaration(VariableDeclaration),

    /// Function declaration
    FunctionDeclaration(Rc<FunctionNode>),

    /// Class declaration
    ClassDeclaration(Rc<ClassNode>),

    /// Block statement { ... }
    Block(Block),

    /// If statement
    If(Box<IfStatement>),

    /// While statement
    While(Box<WhileStatement>),

    /// Break statement
    Break,

    /// Continue statement
    Continue,

    /// Return statement
    Return(Option<Expression>),

    /// Throw statement
    Throw(Expression),
}

/// A braced statement list
#[derive(Debug, Clone)]
pub struct Block {
    pub body: Vec<Statement>,
    /// Block-scoped declarations, collected once when the node is built
    pub scope: BlockScope,
}

impl Block {
    pub fn new(body: Vec<Statement>) -> Self {
        let scope = BlockScope::collect(&body);
        Self { body, scope }
    }
}

/// If statement
#[derive(Debug, Clone)]
pub struct IfStatement {
    /// Test expression
    pub test: Expression,
    /// Consequent statement
    pub consequent: Statement,
    /// Alternate statement
    pub alternate: Option<Statement>,
}

/// While statement
#[derive(Debug, Clone)]
pub struct WhileStatement {
    /// Test expression
    pub test: Expression,
    /// Loop body
    pub body: Statement,
}
