//! User-defined function objects and the invocation protocol
//!
//! [`FunctionObject`] is the payload of `ObjectKind::Function`. Creation
//! follows OrdinaryFunctionCreate: the `length`, `name` and (where the kind
//! calls for one) `prototype` own properties are defined in that order, and
//! the order is observable through `own_property_keys`.
//!
//! `[[Call]]` and `[[Construct]]` live here as `impl VM` methods; body
//! evaluation itself is delegated to the dispatcher.

use super::context::ExecutionContext;
use super::dispatch::Completion;
use super::environment::{Environment, PrivateEnvironment};
use super::object::{Object, ObjectKind, Property};
use super::value::{PropertyKey, Value};
use super::VM;
use crate::ast::{FunctionKind, FunctionNode, ParameterBinding};
use crate::bytecode::Executable;
use crate::error::{messages, must, Error, Result};
use crate::gc::{EnvironmentId, ObjectId, Trace, Visitor};
use bitflags::bitflags;
use std::rc::Rc;
use tracing::trace;

bitflags! {
    /// Facts about a function fixed at creation time
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FunctionFlags: u8 {
        const STRICT = 1 << 0;
        const ARROW = 1 << 1;
        const CLASS_CONSTRUCTOR = 1 << 2;
        const MIGHT_NEED_ARGUMENTS = 1 << 3;
        const CONTAINS_DIRECT_EVAL = 1 << 4;
        /// Every parameter is a plain name without default or rest
        const SIMPLE_PARAMETER_LIST = 1 << 5;
        const METHOD = 1 << 6;
    }
}

/// How `this` is bound on entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThisMode {
    /// Arrow functions resolve `this` through their defining scope
    Lexical,
    /// The this-argument is used unconverted
    Strict,
    /// Nullish becomes the global object, primitives are boxed
    Global,
}

/// `[[ConstructorKind]]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructorKind {
    Base,
    Derived,
}

/// What a function is being created as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionRole {
    /// Declarations, expressions and arrows
    Ordinary,
    /// Class and object methods, field initializers
    Method,
    /// A class constructor
    ClassConstructor(ConstructorKind),
}

/// A per-instance field installed by the constructor
#[derive(Debug, Clone)]
pub struct ClassFieldDefinition {
    pub key: PropertyKey,
    /// Method evaluated with the instance as `this`; `None` initializes to undefined
    pub initializer: Option<ObjectId>,
}

/// A closure over a function node
#[derive(Debug)]
pub struct FunctionObject {
    pub node: Rc<FunctionNode>,
    pub name: String,
    /// Captured environment
    pub environment: EnvironmentId,
    pub private_environment: Option<Rc<PrivateEnvironment>>,
    pub kind: FunctionKind,
    pub this_mode: ThisMode,
    /// `None` for arrows, methods and async functions
    pub constructor_kind: Option<ConstructorKind>,
    pub flags: FunctionFlags,
    /// Object whose prototype `super` property lookups start from
    pub home_object: Option<ObjectId>,
    pub fields: Vec<ClassFieldDefinition>,
    /// Compiled body, filled on the first bytecode call
    pub executable: Option<Rc<Executable>>,
}

impl FunctionObject {
    pub fn is_strict(&self) -> bool {
        self.flags.contains(FunctionFlags::STRICT)
    }

    pub fn is_arrow(&self) -> bool {
        self.flags.contains(FunctionFlags::ARROW)
    }

    pub fn is_class_constructor(&self) -> bool {
        self.flags.contains(FunctionFlags::CLASS_CONSTRUCTOR)
    }

    pub fn has_simple_parameter_list(&self) -> bool {
        self.flags.contains(FunctionFlags::SIMPLE_PARAMETER_LIST)
    }

    pub fn might_need_arguments_object(&self) -> bool {
        self.flags.contains(FunctionFlags::MIGHT_NEED_ARGUMENTS)
    }

    pub fn contains_direct_eval(&self) -> bool {
        self.flags.contains(FunctionFlags::CONTAINS_DIRECT_EVAL)
    }
}

impl Trace for FunctionObject {
    fn trace(&self, visitor: &mut Visitor) {
        visitor.visit_environment(self.environment);
        if let Some(home_object) = self.home_object {
            visitor.visit_object(home_object);
        }
        for field in &self.fields {
            if let PropertyKey::Symbol(symbol) = field.key {
                visitor.visit_symbol(symbol);
            }
            if let Some(initializer) = field.initializer {
                visitor.visit_object(initializer);
            }
        }
    }
}

fn has_simple_parameter_list(node: &FunctionNode) -> bool {
    node.parameters.iter().all(|parameter| {
        matches!(parameter.binding, ParameterBinding::Name(_))
            && parameter.default_value.is_none()
            && !parameter.is_rest
    })
}

impl VM {
    /// The function payload of `id`
    pub fn function_object(&self, id: ObjectId) -> Result<&FunctionObject> {
        self.heap
            .get(id)
            .as_function()
            .ok_or_else(|| Error::InternalError(format!("{:?} is not a user-defined function", id)))
    }

    /// OrdinaryFunctionCreate plus MakeConstructor where the kind allows it
    pub fn ordinary_function_create(
        &mut self,
        node: &Rc<FunctionNode>,
        name: &str,
        environment: EnvironmentId,
        private_environment: Option<Rc<PrivateEnvironment>>,
        role: FunctionRole,
    ) -> ObjectId {
        let intrinsics = self.realm.intrinsics;
        let is_class_constructor = matches!(role, FunctionRole::ClassConstructor(_));
        let strict = node.is_strict || is_class_constructor || self.running_context().is_strict;

        let mut flags = FunctionFlags::empty();
        flags.set(FunctionFlags::STRICT, strict);
        flags.set(FunctionFlags::ARROW, node.is_arrow);
        flags.set(FunctionFlags::CLASS_CONSTRUCTOR, is_class_constructor);
        flags.set(FunctionFlags::METHOD, role == FunctionRole::Method);
        flags.set(FunctionFlags::MIGHT_NEED_ARGUMENTS, node.scope.might_need_arguments_object);
        flags.set(FunctionFlags::CONTAINS_DIRECT_EVAL, node.scope.contains_direct_eval);
        flags.set(FunctionFlags::SIMPLE_PARAMETER_LIST, has_simple_parameter_list(node));

        let this_mode = if node.is_arrow {
            ThisMode::Lexical
        } else if strict {
            ThisMode::Strict
        } else {
            ThisMode::Global
        };

        let constructor_kind = match role {
            FunctionRole::ClassConstructor(kind) => Some(kind),
            FunctionRole::Ordinary if node.kind == FunctionKind::Regular && !node.is_arrow => {
                Some(ConstructorKind::Base)
            }
            _ => None,
        };

        let prototype = match node.kind {
            FunctionKind::Regular => intrinsics.function_prototype,
            FunctionKind::Generator => intrinsics.generator_function_prototype,
            FunctionKind::Async => intrinsics.async_function_prototype,
        };

        let function = FunctionObject {
            node: node.clone(),
            name: name.to_string(),
            environment,
            private_environment,
            kind: node.kind,
            this_mode,
            constructor_kind,
            flags,
            home_object: None,
            fields: Vec::new(),
            executable: None,
        };
        let mut object = Object::with_kind(ObjectKind::Function(Box::new(function)), Some(prototype));
        object.define_property(
            PropertyKey::from("length"),
            Property::with_attributes(Value::Number(node.function_length as f64), false, false, true),
        );
        object.define_property(
            PropertyKey::from("name"),
            Property::with_attributes(Value::from(name), false, false, true),
        );
        let id = self.heap.allocate(object);

        let prototype_object = match (node.kind, role) {
            (FunctionKind::Regular, FunctionRole::Ordinary) if !node.is_arrow => {
                let prototype_object = self.ordinary_object();
                self.heap.get_mut(prototype_object).define_property(
                    PropertyKey::from("constructor"),
                    Property::hidden(Value::Object(id)),
                );
                Some(prototype_object)
            }
            (FunctionKind::Generator, _) => Some(
                self.heap
                    .allocate(Object::ordinary(Some(intrinsics.generator_prototype))),
            ),
            _ => None,
        };
        if let Some(prototype_object) = prototype_object {
            self.heap.get_mut(id).define_property(
                PropertyKey::from("prototype"),
                Property::with_attributes(Value::Object(prototype_object), true, false, false),
            );
        }
        id
    }

    /// InstantiateFunctionObject for a hoisted declaration
    pub fn instantiate_function_object(&mut self, node: &Rc<FunctionNode>, environment: EnvironmentId) -> ObjectId {
        let private_environment = self.running_context().private_environment.clone();
        self.ordinary_function_create(
            node,
            &node.name,
            environment,
            private_environment,
            FunctionRole::Ordinary,
        )
    }

    /// Evaluate a function or arrow expression
    ///
    /// `name` is the name given by the surrounding binding for anonymous
    /// functions. A named non-arrow expression closes over an extra scope
    /// holding its own name.
    pub fn instantiate_function_expression(&mut self, node: &Rc<FunctionNode>, name: Option<&str>) -> Value {
        let context = self.running_context();
        let (scope, private_environment) = (context.lexical_environment, context.private_environment.clone());

        if node.is_arrow || node.name.is_empty() {
            let name = if node.name.is_empty() {
                name.unwrap_or_default()
            } else {
                node.name.as_str()
            };
            let closure = self.ordinary_function_create(
                node,
                name,
                scope,
                private_environment,
                FunctionRole::Ordinary,
            );
            return Value::Object(closure);
        }

        let function_scope = self
            .heap
            .allocate_environment(Environment::declarative(Some(scope)));
        must(
            self.heap.create_immutable_binding(function_scope, &node.name, false),
            "named function expression",
        );
        let closure = self.ordinary_function_create(
            node,
            &node.name,
            function_scope,
            private_environment,
            FunctionRole::Ordinary,
        );
        must(
            self.heap
                .initialize_binding(function_scope, &node.name, Value::Object(closure)),
            "named function expression",
        );
        Value::Object(closure)
    }

    /// PrepareForOrdinaryCall: allocate the function environment and push
    /// the callee context
    ///
    /// A full context stack is a RangeError and nothing is pushed.
    pub fn prepare_for_ordinary_call(
        &mut self,
        function: ObjectId,
        new_target: Option<ObjectId>,
        arguments: Vec<Value>,
    ) -> Result<EnvironmentId> {
        let callee = self.function_object(function)?;
        let name = callee.name.clone();
        let is_strict = callee.is_strict();
        let is_lexical_this = callee.this_mode == ThisMode::Lexical;
        let outer = callee.environment;
        let private_environment = callee.private_environment.clone();

        let environment = self.heap.allocate_environment(Environment::function(
            function,
            is_lexical_this,
            new_target,
            outer,
        ));
        self.contexts.push(ExecutionContext {
            function: Some(function),
            function_name: name,
            lexical_environment: environment,
            variable_environment: environment,
            private_environment,
            arguments,
            is_strict,
            annex_b_function_names: Vec::new(),
        })?;
        Ok(environment)
    }

    /// OrdinaryCallBindThis
    pub fn ordinary_call_bind_this(
        &mut self,
        function: ObjectId,
        environment: EnvironmentId,
        this_argument: Value,
    ) -> Result<()> {
        let this_mode = self.function_object(function)?.this_mode;
        let this_value = match this_mode {
            ThisMode::Lexical => return Ok(()),
            ThisMode::Strict => this_argument,
            ThisMode::Global if this_argument.is_nullish() => Value::Object(self.realm.global_object),
            ThisMode::Global => Value::Object(self.to_object(&this_argument)?),
        };
        must(
            self.heap.bind_this_value(environment, this_value),
            "binding this on entry",
        );
        Ok(())
    }

    /// `[[Call]]` of a user-defined function
    pub fn internal_call(&mut self, function: ObjectId, this_argument: Value, arguments: Vec<Value>) -> Result<Value> {
        let callee = self.function_object(function)?;
        let name = callee.name.clone();
        let is_class_constructor = callee.is_class_constructor();
        trace!(function = %name, argc = arguments.len(), "call");

        let environment = self
            .prepare_for_ordinary_call(function, None, arguments)
            .map_err(|error| self.error_with_stack(error))?;

        if is_class_constructor {
            let error = self.error_with_stack(Error::type_error(messages::CLASS_CONSTRUCTOR_WITHOUT_NEW));
            self.contexts.pop();
            return Err(error);
        }

        let result = self
            .ordinary_call_bind_this(function, environment, this_argument)
            .and_then(|()| self.evaluate_body(function))
            .map_err(|error| self.error_with_stack(error));
        self.contexts.pop();

        let completion = result?;
        trace!(function = %name, completion = completion.kind_name(), "call returned");
        match completion {
            Completion::Return(value) => Ok(value),
            Completion::Normal(_) => Ok(Value::Undefined),
            Completion::Break | Completion::Continue => unreachable!(
                "{} completion reached the top of function '{}'",
                completion.kind_name(),
                name
            ),
        }
    }

    /// `[[Construct]]` of a user-defined function
    pub fn internal_construct(
        &mut self,
        constructor: ObjectId,
        arguments: Vec<Value>,
        new_target: ObjectId,
    ) -> Result<Value> {
        let callee = self.function_object(constructor)?;
        let name = callee.name.clone();
        let kind = callee
            .constructor_kind
            .ok_or_else(|| Error::type_error(messages::not_a_constructor(&name)))?;
        trace!(function = %name, argc = arguments.len(), ?kind, "construct");

        let this_argument = match kind {
            ConstructorKind::Base => {
                let default = self.realm.intrinsics.object_prototype;
                let prototype = self.get_prototype_from_constructor(new_target, default)?;
                Some(self.heap.allocate(Object::ordinary(Some(prototype))))
            }
            ConstructorKind::Derived => None,
        };

        let environment = self
            .prepare_for_ordinary_call(constructor, Some(new_target), arguments)
            .map_err(|error| self.error_with_stack(error))?;

        if let Some(this_argument) = this_argument {
            let initialized = self
                .ordinary_call_bind_this(constructor, environment, Value::Object(this_argument))
                .and_then(|()| self.initialize_instance_elements(this_argument, constructor));
            if let Err(error) = initialized {
                let error = self.error_with_stack(error);
                self.contexts.pop();
                return Err(error);
            }
        }

        let result = self
            .evaluate_body(constructor)
            .map_err(|error| self.error_with_stack(error));
        self.contexts.pop();

        let completion = result?;
        trace!(function = %name, completion = completion.kind_name(), "construct returned");
        if let Completion::Return(value) = completion {
            if let Value::Object(object) = value {
                if kind == ConstructorKind::Derived {
                    // Keeps subclass instances returned from a derived body on new.target's chain
                    if let Value::Object(prototype) = self.get(new_target, &PropertyKey::from("prototype"))? {
                        self.heap.get_mut(object).prototype = Some(prototype);
                    }
                }
                return Ok(Value::Object(object));
            }
            if let Some(this_argument) = this_argument {
                return Ok(Value::Object(this_argument));
            }
            if !value.is_undefined() {
                return Err(Error::type_error(messages::DERIVED_CONSTRUCTOR_RETURNING_INVALID_VALUE));
            }
        }

        self.heap
            .get_this_binding(environment)
            .map_err(|error| self.error_with_stack(error))
    }

    /// SetFunctionName on an already created function
    pub fn set_name(&mut self, function: ObjectId, name: &str) -> Result<()> {
        let object = self.heap.get_mut(function);
        let payload = object
            .as_function_mut()
            .ok_or_else(|| Error::InternalError(format!("{:?} is not a user-defined function", function)))?;
        payload.name = name.to_string();
        object.define_property(
            PropertyKey::from("name"),
            Property::with_attributes(Value::from(name), false, false, true),
        );
        Ok(())
    }

    /// Append an instance field to a class constructor
    pub fn add_field(&mut self, constructor: ObjectId, field: ClassFieldDefinition) -> Result<()> {
        self.heap
            .get_mut(constructor)
            .as_function_mut()
            .ok_or_else(|| Error::InternalError(format!("{:?} is not a user-defined function", constructor)))?
            .fields
            .push(field);
        Ok(())
    }

    /// InitializeInstanceElements: run the constructor's field initializers
    /// against a fresh instance, in definition order
    pub fn initialize_instance_elements(&mut self, object: ObjectId, constructor: ObjectId) -> Result<()> {
        let fields = self.function_object(constructor)?.fields.clone();
        for field in fields {
            let value = match field.initializer {
                Some(initializer) => self.call(&Value::Object(initializer), Value::Object(object), Vec::new())?,
                None => Value::Undefined,
            };
            self.create_data_property_or_throw(object, field.key, value)?;
        }
        Ok(())
    }
}
