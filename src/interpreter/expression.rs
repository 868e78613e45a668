//! Expression evaluation

use crate::ast::{
    Argument, AssignmentTarget, ClassNode, Expression, Literal, MemberExpression, MemberProperty, PropertyName,
    UnaryOperator,
};
use crate::error::{Error, Result};
use crate::gc::ObjectId;
use crate::runtime::{PropertyKey, ReferenceBase, Value, VM};
use std::rc::Rc;

impl VM {
    pub fn evaluate_expression(&mut self, expression: &Expression) -> Result<Value> {
        match expression {
            Expression::Literal(literal) => Ok(match literal {
                Literal::Undefined => Value::Undefined,
                Literal::Null => Value::Null,
                Literal::Boolean(b) => Value::Boolean(*b),
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::String(s.clone()),
            }),
            Expression::Identifier(name) => {
                let reference = self.resolve_reference(name, None);
                self.get_reference_value(&reference)
            }
            Expression::This => self.resolve_this_binding(),
            Expression::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate_expression(element)?);
                }
                Ok(Value::Object(self.create_array(values)))
            }
            Expression::Object(properties) => {
                let object = self.ordinary_object();
                for property in properties {
                    let key = self.evaluate_property_name(&property.key)?;
                    let value = match &key {
                        PropertyKey::String(name) => self.evaluate_named(&property.value, name)?,
                        PropertyKey::Symbol(_) => self.evaluate_expression(&property.value)?,
                    };
                    self.create_data_property_or_throw(object, key, value)?;
                }
                Ok(Value::Object(object))
            }
            Expression::Function(node) => Ok(self.instantiate_function_expression(node, None)),
            Expression::Class(class) => Ok(Value::Object(self.evaluate_class(class, None)?)),
            Expression::Unary(operator, operand) => self.evaluate_unary(*operator, operand),
            Expression::Binary(operator, left, right) => {
                let left = self.evaluate_expression(left)?;
                let right = self.evaluate_expression(right)?;
                self.apply_binary_operator(*operator, &left, &right)
            }
            Expression::Assignment(assignment) => match &assignment.target {
                AssignmentTarget::Identifier(name) => {
                    let reference = self.resolve_reference(name, None);
                    let value = self.evaluate_named(&assignment.value, name)?;
                    self.put_value(&reference, value.clone())?;
                    Ok(value)
                }
                AssignmentTarget::Member(member) => {
                    let (object, key) = self.evaluate_member_target(member)?;
                    let value = self.evaluate_expression(&assignment.value)?;
                    self.put_value_property(&object, key, value.clone())?;
                    Ok(value)
                }
            },
            Expression::Member(member) => {
                let (object, key) = self.evaluate_member_target(member)?;
                self.get_value_property(&object, &key)
            }
            Expression::Call(call) => {
                let (callee, this_value) = match &call.callee {
                    Expression::Member(member) => {
                        let (object, key) = self.evaluate_member_target(member)?;
                        let callee = self.get_value_property(&object, &key)?;
                        (callee, object)
                    }
                    callee => (self.evaluate_expression(callee)?, Value::Undefined),
                };
                let arguments = self.evaluate_arguments(&call.arguments)?;
                self.call(&callee, this_value, arguments)
            }
            Expression::New(call) => {
                let constructor = self.evaluate_expression(&call.callee)?;
                let arguments = self.evaluate_arguments(&call.arguments)?;
                self.construct(&constructor, arguments, None)
            }
            Expression::SuperCall(arguments) => {
                let arguments = self.evaluate_arguments(arguments)?;
                self.super_call(arguments)
            }
            Expression::Yield(_) => Err(Error::syntax_error("yield is only valid in generator functions")),
            Expression::Await(operand) => {
                let value = self.evaluate_expression(operand)?;
                self.await_value(value)
            }
        }
    }

    /// NamedEvaluation: anonymous function and class expressions take `name`
    pub fn evaluate_named(&mut self, expression: &Expression, name: &str) -> Result<Value> {
        match expression {
            Expression::Function(node) if node.name.is_empty() => {
                Ok(self.instantiate_function_expression(node, Some(name)))
            }
            Expression::Class(class) if class.name.is_none() => {
                Ok(Value::Object(self.evaluate_class(class, Some(name))?))
            }
            expression => self.evaluate_expression(expression),
        }
    }

    /// Evaluate the heritage and field keys, then define the class
    pub(crate) fn evaluate_class(&mut self, class: &Rc<ClassNode>, binding_name: Option<&str>) -> Result<ObjectId> {
        let super_class = match &class.super_class {
            Some(heritage) => Some(self.evaluate_expression(heritage)?),
            None => None,
        };
        let mut field_keys = Vec::with_capacity(class.fields.len());
        for field in &class.fields {
            field_keys.push(self.evaluate_property_name(&field.key)?);
        }
        self.class_definition_evaluation(class, binding_name, super_class, field_keys)
    }

    fn evaluate_property_name(&mut self, name: &PropertyName) -> Result<PropertyKey> {
        match name {
            PropertyName::Identifier(name) => Ok(PropertyKey::from(name.as_str())),
            PropertyName::Computed(expression) => {
                let key = self.evaluate_expression(expression)?;
                self.to_property_key(&key)
            }
        }
    }

    fn evaluate_member_target(&mut self, member: &MemberExpression) -> Result<(Value, PropertyKey)> {
        let object = self.evaluate_expression(&member.object)?;
        let key = match &member.property {
            MemberProperty::Named(name) => PropertyKey::from(name.as_str()),
            MemberProperty::Computed(expression) => {
                let key = self.evaluate_expression(expression)?;
                self.to_property_key(&key)?
            }
        };
        Ok((object, key))
    }

    fn evaluate_arguments(&mut self, arguments: &[Argument]) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            match argument {
                Argument::Expression(expression) => values.push(self.evaluate_expression(expression)?),
                Argument::Spread(expression) => {
                    let iterable = self.evaluate_expression(expression)?;
                    values.extend(self.iterate_to_list(&iterable)?);
                }
            }
        }
        Ok(values)
    }

    fn evaluate_unary(&mut self, operator: UnaryOperator, operand: &Expression) -> Result<Value> {
        if let (UnaryOperator::Typeof, Expression::Identifier(name)) = (operator, operand) {
            let reference = self.resolve_reference(name, None);
            if reference.base == ReferenceBase::Unresolvable {
                return Ok(Value::from("undefined"));
            }
            let value = self.get_reference_value(&reference)?;
            return Ok(Value::from(self.type_of(&value)));
        }
        let value = self.evaluate_expression(operand)?;
        Ok(match operator {
            UnaryOperator::Minus => Value::Number(-self.to_number_value(&value)?),
            UnaryOperator::Not => Value::Boolean(!value.to_boolean()),
            UnaryOperator::Typeof => Value::from(self.type_of(&value)),
            UnaryOperator::Void => Value::Undefined,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::builder::*;
    use crate::ast::{Expression, FunctionNode};
    use crate::runtime::{PropertyKey, Value, VM};
    use std::rc::Rc;

    fn invoke(vm: &mut VM, node: &Rc<FunctionNode>, this: Value, arguments: Vec<Value>) -> crate::error::Result<Value> {
        let env = vm.realm.global_environment;
        let f = vm.instantiate_function_object(node, env);
        vm.call(&Value::Object(f), this, arguments)
    }

    #[test]
    fn test_member_call_passes_receiver() {
        let mut vm = VM::default();
        // return { v: 3, get: function () { return this.v; } }.get()
        let getter = function("", &[], vec![ret(member(this(), "v"))]);
        let node = function(
            "f",
            &[],
            vec![ret(call(
                member(object(vec![("v", num(3.0)), ("get", func_expr(getter))]), "get"),
                vec![],
            ))],
        );
        assert_eq!(invoke(&mut vm, &node, Value::Undefined, vec![]).unwrap(), Value::from(3));
    }

    #[test]
    fn test_anonymous_function_takes_binding_name() {
        let mut vm = VM::default();
        let node = function(
            "f",
            &[],
            vec![
                var("named", Some(func_expr(function("", &[], vec![])))),
                ret(member(ident("named"), "name")),
            ],
        );
        assert_eq!(invoke(&mut vm, &node, Value::Undefined, vec![]).unwrap(), Value::from("named"));
    }

    #[test]
    fn test_typeof_unresolvable_is_undefined() {
        let mut vm = VM::default();
        let node = function("f", &[], vec![ret(typeof_(ident("nowhere")))]);
        assert_eq!(invoke(&mut vm, &node, Value::Undefined, vec![]).unwrap(), Value::from("undefined"));
    }

    #[test]
    fn test_spread_arguments() {
        let mut vm = VM::default();
        let sum = function("sum", &["a", "b", "c"], vec![ret(add_(add_(ident("a"), ident("b")), ident("c")))]);
        let node = function(
            "f",
            &[],
            vec![ret(call_with(
                func_expr(sum),
                vec![spread(array(vec![num(1.0), num(2.0)])), crate::ast::Argument::Expression(num(3.0))],
            ))],
        );
        assert_eq!(invoke(&mut vm, &node, Value::Undefined, vec![]).unwrap(), Value::from(6));
    }

    #[test]
    fn test_arrow_captures_this() {
        let mut vm = VM::default();
        let node = function(
            "f",
            &[],
            vec![ret(call(arrow(&[], expr_body(member(this(), "tag"))), vec![]))],
        );
        let receiver = vm.ordinary_object();
        vm.heap
            .get_mut(receiver)
            .define_data_property(PropertyKey::from("tag"), Value::from("outer"));
        assert_eq!(
            invoke(&mut vm, &node, Value::Object(receiver), vec![]).unwrap(),
            Value::from("outer")
        );
    }

    #[test]
    fn test_calling_undefined_is_type_error() {
        let mut vm = VM::default();
        let node = function("f", &[], vec![expr(call(undefined(), vec![]))]);
        assert!(invoke(&mut vm, &node, Value::Undefined, vec![]).unwrap_err().is_type_error());
    }

    #[test]
    fn test_yield_outside_generator() {
        let mut vm = VM::default();
        let node = function("f", &[], vec![expr(Expression::Yield(None))]);
        assert!(invoke(&mut vm, &node, Value::Undefined, vec![]).is_err());
    }
}
