//! Class definition evaluation and `super(...)`

use super::environment::{Environment, PrivateEnvironment};
use super::function::{ClassFieldDefinition, ConstructorKind, FunctionRole};
use super::object::{Object, Property};
use super::value::{PropertyKey, Value};
use super::VM;
use crate::ast::{
    Argument, ClassNode, Expression, FormalParameter, FunctionBody, FunctionKind, FunctionNode, ParameterBinding,
    PropertyName, Statement,
};
use crate::error::{must, Error, Result};
use crate::gc::ObjectId;
use std::rc::Rc;

/// Instance field keys of a class whose keys are all static
pub(crate) fn static_field_keys(class: &ClassNode) -> Result<Vec<PropertyKey>> {
    class
        .fields
        .iter()
        .map(|field| match &field.key {
            PropertyName::Identifier(name) => Ok(PropertyKey::from(name.as_str())),
            PropertyName::Computed(_) => Err(Error::not_implemented("Computed class field keys in compiled code")),
        })
        .collect()
}

/// `constructor() {}` or `constructor(...args) { super(...args) }`
fn default_constructor(name: &str, kind: ConstructorKind) -> Rc<FunctionNode> {
    let (parameters, body) = match kind {
        ConstructorKind::Base => (Vec::new(), Vec::new()),
        ConstructorKind::Derived => (
            vec![FormalParameter {
                binding: ParameterBinding::Name("args".to_string()),
                default_value: None,
                is_rest: true,
            }],
            vec![Statement::Expression(Expression::SuperCall(vec![Argument::Spread(
                Expression::Identifier("args".to_string()),
            )]))],
        ),
    };
    Rc::new(FunctionNode::new(
        name,
        parameters,
        FunctionBody::Block(body),
        FunctionKind::Regular,
        false,
        true,
    ))
}

impl VM {
    /// ClassDefinitionEvaluation
    ///
    /// `super_class` is the already evaluated `extends` operand and
    /// `field_keys` the evaluated instance field keys, one per field.
    pub fn class_definition_evaluation(
        &mut self,
        class: &Rc<ClassNode>,
        binding_name: Option<&str>,
        super_class: Option<Value>,
        field_keys: Vec<PropertyKey>,
    ) -> Result<ObjectId> {
        if field_keys.len() != class.fields.len() {
            return Err(Error::InternalError(format!(
                "class has {} fields but {} keys were evaluated",
                class.fields.len(),
                field_keys.len()
            )));
        }
        let intrinsics = self.realm.intrinsics;
        let context = self.running_context();
        let outer = context.lexical_environment;
        let private_environment = Some(Rc::new(PrivateEnvironment::new(context.private_environment.clone())));

        let class_scope = self
            .heap
            .allocate_environment(Environment::declarative(Some(outer)));
        if let Some(name) = &class.name {
            must(
                self.heap.create_immutable_binding(class_scope, name, true),
                "class scope instantiation",
            );
        }

        let (prototype_parent, constructor_parent, kind) = match super_class {
            None => (
                Some(intrinsics.object_prototype),
                intrinsics.function_prototype,
                ConstructorKind::Base,
            ),
            Some(Value::Null) => (None, intrinsics.function_prototype, ConstructorKind::Derived),
            Some(parent) => {
                if !self.is_constructor(&parent) {
                    return Err(Error::type_error(format!(
                        "Class extends value {} is not a constructor or null",
                        self.describe(&parent)
                    )));
                }
                let parent = self.expect_object(&parent)?;
                let prototype_parent = match self.get(parent, &PropertyKey::from("prototype"))? {
                    Value::Object(prototype) => Some(prototype),
                    Value::Null => None,
                    other => {
                        return Err(Error::type_error(format!(
                            "Class extends value does not have valid prototype property {}",
                            self.describe(&other)
                        )))
                    }
                };
                (prototype_parent, parent, ConstructorKind::Derived)
            }
        };

        let prototype = self.heap.allocate(Object::ordinary(prototype_parent));
        let class_name = class.name.as_deref().unwrap_or_default();
        let constructor_node = match &class.constructor {
            Some(node) => node.clone(),
            None => default_constructor(class_name, kind),
        };
        let constructor = self.ordinary_function_create(
            &constructor_node,
            class_name,
            class_scope,
            private_environment.clone(),
            FunctionRole::ClassConstructor(kind),
        );
        {
            let object = self.heap.get_mut(constructor);
            object.prototype = Some(constructor_parent);
            object.define_property(
                PropertyKey::from("prototype"),
                Property::with_attributes(Value::Object(prototype), false, false, false),
            );
            if let Some(function) = object.as_function_mut() {
                function.home_object = Some(prototype);
            }
        }
        self.heap.get_mut(prototype).define_property(
            PropertyKey::from("constructor"),
            Property::hidden(Value::Object(constructor)),
        );

        for method in &class.methods {
            let home = if method.is_static { constructor } else { prototype };
            let closure = self.ordinary_function_create(
                &method.function,
                &method.key,
                class_scope,
                private_environment.clone(),
                FunctionRole::Method,
            );
            if let Some(function) = self.heap.get_mut(closure).as_function_mut() {
                function.home_object = Some(home);
            }
            self.define_property_or_throw(
                home,
                PropertyKey::from(method.key.as_str()),
                Property::hidden(Value::Object(closure)),
            )?;
        }

        for (field, key) in class.fields.iter().zip(field_keys) {
            let initializer = match &field.value {
                Some(value) => {
                    let node = Rc::new(FunctionNode::new(
                        "",
                        Vec::new(),
                        FunctionBody::Expression(value.clone()),
                        FunctionKind::Regular,
                        false,
                        true,
                    ));
                    let closure = self.ordinary_function_create(
                        &node,
                        &key.to_string(),
                        class_scope,
                        private_environment.clone(),
                        FunctionRole::Method,
                    );
                    if let Some(function) = self.heap.get_mut(closure).as_function_mut() {
                        function.home_object = Some(prototype);
                    }
                    Some(closure)
                }
                None => None,
            };
            self.add_field(constructor, ClassFieldDefinition { key, initializer })?;
        }

        match (&class.name, binding_name) {
            (Some(name), _) => self
                .heap
                .initialize_binding(class_scope, name, Value::Object(constructor))?,
            (None, Some(name)) => self.set_name(constructor, name)?,
            (None, None) => {}
        }
        Ok(constructor)
    }

    /// SuperCall: construct the parent with the current new.target and bind
    /// the result as `this`
    pub fn super_call(&mut self, arguments: Vec<Value>) -> Result<Value> {
        let this_environment = self
            .heap
            .get_this_environment(self.running_context().lexical_environment);
        let (active_function, new_target) = match self.heap.environment(this_environment).as_function() {
            Some(function) => (function.function, function.new_target),
            None => return Err(Error::syntax_error("'super' keyword unexpected here")),
        };
        let new_target = new_target.ok_or_else(|| Error::syntax_error("'super' keyword unexpected here"))?;

        let parent = self.heap.get(active_function).prototype;
        let parent = match parent {
            Some(parent) if self.is_constructor(&Value::Object(parent)) => parent,
            parent => {
                let described = parent.map_or_else(|| "null".to_string(), |p| self.describe(&Value::Object(p)));
                return Err(Error::type_error(format!(
                    "Super constructor {} of anonymous class is not a constructor",
                    described
                )));
            }
        };

        let result = self.construct(&Value::Object(parent), arguments, Some(new_target))?;
        let this_object = self.expect_object(&result)?;
        self.heap.bind_this_value(this_environment, result.clone())?;
        self.initialize_instance_elements(this_object, active_function)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::*;
    use crate::runtime::object::ObjectKind;

    fn define(vm: &mut VM, node: ClassNode, super_class: Option<Value>) -> ObjectId {
        let node = Rc::new(node);
        let keys = static_field_keys(&node).unwrap();
        vm.class_definition_evaluation(&node, None, super_class, keys).unwrap()
    }

    fn property(vm: &VM, value: &Value, key: &str) -> Value {
        vm.get_value_property(value, &PropertyKey::from(key)).unwrap()
    }

    #[test]
    fn test_base_class_fields_run_before_body() {
        let mut vm = VM::default();
        let point = class("Point", None)
            .with_field("x", Some(num(1.0)))
            .with_field("y", None)
            .with_constructor(&["a"], vec![expr(assign_member(this(), "a", add_(member(this(), "x"), ident("a"))))])
            .with_method("getA", &[], vec![ret(member(this(), "a"))]);
        let constructor = define(&mut vm, point, None);

        let instance = vm.construct(&Value::Object(constructor), vec![Value::from(4)], None).unwrap();
        assert_eq!(property(&vm, &instance, "x"), Value::from(1));
        assert_eq!(property(&vm, &instance, "y"), Value::Undefined);
        assert_eq!(property(&vm, &instance, "a"), Value::from(5));

        let get_a = property(&vm, &instance, "getA");
        assert_eq!(vm.call(&get_a, instance.clone(), vec![]).unwrap(), Value::from(5));
    }

    #[test]
    fn test_class_constructor_requires_new() {
        let mut vm = VM::default();
        let constructor = define(&mut vm, class("C", None), None);
        let err = vm.call(&Value::Object(constructor), Value::Undefined, vec![]).unwrap_err();
        assert!(err.is_type_error());
        assert_eq!(vm.contexts.len(), 1);
    }

    #[test]
    fn test_prototype_wiring() {
        let mut vm = VM::default();
        let base = define(&mut vm, class("Base", None), None);
        let derived = define(&mut vm, class("Derived", Some(ident("Base"))), Some(Value::Object(base)));

        assert_eq!(vm.heap.get(derived).prototype, Some(base));
        let base_prototype = property(&vm, &Value::Object(base), "prototype");
        let derived_prototype = property(&vm, &Value::Object(derived), "prototype").as_object().unwrap();
        assert_eq!(vm.heap.get(derived_prototype).prototype, base_prototype.as_object());

        let prototype_property = vm
            .heap
            .get(derived)
            .get_own_property(&PropertyKey::from("prototype"))
            .unwrap()
            .clone();
        assert!(!prototype_property.writable && !prototype_property.configurable);
    }

    #[test]
    fn test_default_derived_constructor_forwards_arguments() {
        let mut vm = VM::default();
        let base = define(
            &mut vm,
            class("Base", None).with_constructor(&["v"], vec![expr(assign_member(this(), "v", ident("v")))]),
            None,
        );
        let derived = define(
            &mut vm,
            class("Derived", Some(ident("Base"))).with_field("extra", Some(bool_(true))),
            Some(Value::Object(base)),
        );
        let instance = vm.construct(&Value::Object(derived), vec![Value::from(9)], None).unwrap();
        assert_eq!(property(&vm, &instance, "v"), Value::from(9));
        assert_eq!(property(&vm, &instance, "extra"), Value::Boolean(true));

        let derived_prototype = property(&vm, &Value::Object(derived), "prototype").as_object();
        assert_eq!(vm.heap.get(instance.as_object().unwrap()).prototype, derived_prototype);
    }

    #[test]
    fn test_missing_super_call_is_reference_error() {
        let mut vm = VM::default();
        let base = define(&mut vm, class("Base", None), None);
        let derived = define(
            &mut vm,
            class("Derived", Some(ident("Base"))).with_constructor(&[], vec![]),
            Some(Value::Object(base)),
        );
        let err = vm.construct(&Value::Object(derived), vec![], None).unwrap_err();
        assert!(err.is_reference_error());
    }

    #[test]
    fn test_super_called_twice_is_reference_error() {
        let mut vm = VM::default();
        let base = define(&mut vm, class("Base", None), None);
        let derived = define(
            &mut vm,
            class("Derived", Some(ident("Base")))
                .with_constructor(&[], vec![expr(super_call(vec![])), expr(super_call(vec![]))]),
            Some(Value::Object(base)),
        );
        let err = vm.construct(&Value::Object(derived), vec![], None).unwrap_err();
        assert!(err.is_reference_error());
        assert_eq!(vm.contexts.len(), 1);
    }

    #[test]
    fn test_extends_non_constructor() {
        let mut vm = VM::default();
        let node = Rc::new(class("Bad", Some(num(1.0))));
        let err = vm
            .class_definition_evaluation(&node, None, Some(Value::from(1)), vec![])
            .unwrap_err();
        assert!(err.is_type_error());
    }

    #[test]
    fn test_anonymous_class_takes_binding_name() {
        let mut vm = VM::default();
        let node = Rc::new(class("", None));
        let constructor = vm
            .class_definition_evaluation(&node, Some("Named"), None, vec![])
            .unwrap();
        assert_eq!(property(&vm, &Value::Object(constructor), "name"), Value::from("Named"));
        assert!(matches!(vm.heap.get(constructor).kind, ObjectKind::Function(_)));
    }
}
