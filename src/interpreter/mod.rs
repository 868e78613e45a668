//! Tree-walking evaluation
//!
//! The direct execution strategy: statements and expressions are evaluated
//! straight off the AST against the running execution context. Function
//! calls made from here go back through the ordinary invocation protocol, so
//! a tree-walked caller and a compiled callee (or the reverse) interoperate.

mod expression;
mod statement;

use crate::ast::{FunctionBody, FunctionNode};
use crate::error::Result;
use crate::runtime::{Completion, VM};

impl VM {
    /// Evaluate a function body whose declarations are already instantiated
    ///
    /// A concise (expression) body completes with a return of its value.
    pub fn evaluate_function_body(&mut self, node: &FunctionNode) -> Result<Completion> {
        match &node.body {
            FunctionBody::Expression(expression) => Ok(Completion::Return(self.evaluate_expression(expression)?)),
            FunctionBody::Block(statements) => self.evaluate_statements(statements),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::*;
    use crate::runtime::Value;
    use std::rc::Rc;

    fn run(node: &Rc<FunctionNode>, arguments: Vec<Value>) -> Result<Value> {
        let mut vm = VM::default();
        let env = vm.realm.global_environment;
        let f = vm.instantiate_function_object(node, env);
        vm.call(&Value::Object(f), Value::Undefined, arguments)
    }

    #[test]
    fn test_concise_body_returns_its_value() {
        let mut vm = VM::default();
        let double = match arrow(&["x"], expr_body(mul_(ident("x"), num(2.0)))) {
            crate::ast::Expression::Function(node) => node,
            _ => unreachable!(),
        };
        let env = vm.realm.global_environment;
        let f = vm.instantiate_function_object(&double, env);
        assert_eq!(
            vm.call(&Value::Object(f), Value::Undefined, vec![Value::from(21)]).unwrap(),
            Value::from(42)
        );
    }

    #[test]
    fn test_falling_off_the_end_is_undefined() {
        let node = function("f", &[], vec![expr(num(1.0))]);
        assert_eq!(run(&node, vec![]).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_while_with_break_and_continue() {
        // var i = 0, n = 0; while (i < 10) { i = i + 1; if (i === 3) continue; if (i === 6) break; n = n + i; } return n;
        let node = function(
            "f",
            &[],
            vec![
                var("i", Some(num(0.0))),
                var("n", Some(num(0.0))),
                while_(
                    lt(ident("i"), num(10.0)),
                    block(vec![
                        expr(assign("i", add_(ident("i"), num(1.0)))),
                        if_(strict_eq(ident("i"), num(3.0)), continue_(), None),
                        if_(strict_eq(ident("i"), num(6.0)), break_(), None),
                        expr(assign("n", add_(ident("n"), ident("i")))),
                    ]),
                ),
                ret(ident("n")),
            ],
        );
        assert_eq!(run(&node, vec![]).unwrap(), Value::from(1 + 2 + 4 + 5));
    }
}
