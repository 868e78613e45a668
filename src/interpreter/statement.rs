//! Statement evaluation

use crate::ast::{Block, Pattern, Statement, VariableDeclaration, VariableKind};
use crate::error::{Error, Result};
use crate::runtime::{Completion, DefaultEvaluation, Value, VM};

impl VM {
    /// Evaluate a statement list, stopping at the first abrupt completion
    pub fn evaluate_statements(&mut self, statements: &[Statement]) -> Result<Completion> {
        let mut last = None;
        for statement in statements {
            match self.evaluate_statement(statement)? {
                Completion::Normal(value) => {
                    if value.is_some() {
                        last = value;
                    }
                }
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal(last))
    }

    pub fn evaluate_statement(&mut self, statement: &Statement) -> Result<Completion> {
        match statement {
            Statement::Empty => Ok(Completion::Normal(None)),
            Statement::Expression(expression) => Ok(Completion::Normal(Some(self.evaluate_expression(expression)?))),
            Statement::VariableDeclaration(declaration) => {
                self.evaluate_variable_declaration(declaration)?;
                Ok(Completion::Normal(None))
            }
            // Hoisted by declaration instantiation
            Statement::FunctionDeclaration(_) => Ok(Completion::Normal(None)),
            Statement::ClassDeclaration(class) => {
                let constructor = self.evaluate_class(class, None)?;
                if let Some(name) = &class.name {
                    let env = self.running_context().lexical_environment;
                    let reference = self.resolve_reference(name, Some(env));
                    self.initialize_referenced_binding(&reference, Value::Object(constructor))?;
                }
                Ok(Completion::Normal(None))
            }
            Statement::Block(block) => self.evaluate_block(block),
            Statement::If(statement) => {
                if self.evaluate_expression(&statement.test)?.to_boolean() {
                    self.evaluate_statement(&statement.consequent)
                } else if let Some(alternate) = &statement.alternate {
                    self.evaluate_statement(alternate)
                } else {
                    Ok(Completion::Normal(None))
                }
            }
            Statement::While(statement) => {
                let mut last = None;
                while self.evaluate_expression(&statement.test)?.to_boolean() {
                    match self.evaluate_statement(&statement.body)? {
                        Completion::Break => break,
                        Completion::Continue => {}
                        Completion::Normal(value) => {
                            if value.is_some() {
                                last = value;
                            }
                        }
                        completion @ Completion::Return(_) => return Ok(completion),
                    }
                }
                Ok(Completion::Normal(last))
            }
            Statement::Break => Ok(Completion::Break),
            Statement::Continue => Ok(Completion::Continue),
            Statement::Return(argument) => {
                let value = match argument {
                    Some(argument) => self.evaluate_expression(argument)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Statement::Throw(argument) => {
                let value = self.evaluate_expression(argument)?;
                Err(Error::Thrown(value))
            }
        }
    }

    fn evaluate_block(&mut self, block: &Block) -> Result<Completion> {
        if block.scope.is_empty() {
            return self.evaluate_statements(&block.body);
        }
        self.enter_block_scope(&block.scope)?;
        let result = self.evaluate_block_body(&block.body);
        self.leave_block_scope()?;
        result
    }

    fn evaluate_block_body(&mut self, statements: &[Statement]) -> Result<Completion> {
        let mut last = None;
        for statement in statements {
            let completion = match statement {
                Statement::FunctionDeclaration(function) => {
                    self.annex_b_copy(&function.name)?;
                    Completion::Normal(None)
                }
                statement => self.evaluate_statement(statement)?,
            };
            match completion {
                Completion::Normal(value) => {
                    if value.is_some() {
                        last = value;
                    }
                }
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal(last))
    }

    fn evaluate_variable_declaration(&mut self, declaration: &VariableDeclaration) -> Result<()> {
        for declarator in &declaration.declarations {
            let names = declarator.id.bound_names();
            let single_name = match names.as_slice() {
                [name] if matches!(declarator.id, Pattern::Identifier(_)) => Some(*name),
                _ => None,
            };
            let value = match (&declarator.init, declaration.kind) {
                (Some(init), _) => match single_name {
                    Some(name) => self.evaluate_named(init, name)?,
                    None => self.evaluate_expression(init)?,
                },
                // `var x;` leaves the hoisted binding alone
                (None, VariableKind::Var) => continue,
                (None, _) => Value::Undefined,
            };
            let environment = match declaration.kind {
                VariableKind::Var => None,
                VariableKind::Let | VariableKind::Const => Some(self.running_context().lexical_environment),
            };
            self.binding_initialization(&declarator.id, value, environment, DefaultEvaluation::Evaluate)?;
        }
        Ok(())
    }
}
