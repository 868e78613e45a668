//! Abstract operations over values and objects
//!
//! Property access, conversions, operators and the call/construct entry
//! points every evaluation strategy goes through.

use super::environment::Environment;
use super::generator::ResumeInput;
use super::object::{NativeBehaviour, NativeFunction, Object, ObjectKind, Property};
use super::value::{number_to_string, PropertyKey, Value};
use super::VM;
use crate::ast::{BinaryOperator, BlockScope};
use crate::error::{messages, must, Error, Result};
use crate::gc::ObjectId;
use tracing::trace;

/// Native stack that must remain before another invocation starts; one
/// script-level call can use several tens of KiB in unoptimized builds
const STACK_RED_ZONE: usize = 512 * 1024;
/// Size of each stack segment allocated once the red zone is reached
const STACK_SEGMENT_SIZE: usize = 8 * 1024 * 1024;

impl VM {
    /// Allocate an empty ordinary object inheriting `%Object.prototype%`
    pub fn ordinary_object(&mut self) -> ObjectId {
        let prototype = self.realm.intrinsics.object_prototype;
        self.heap.allocate(Object::ordinary(Some(prototype)))
    }

    /// CreateArrayFromList
    pub fn create_array(&mut self, elements: Vec<Value>) -> ObjectId {
        let prototype = self.realm.intrinsics.array_prototype;
        self.heap
            .allocate(Object::with_kind(ObjectKind::Array(elements), Some(prototype)))
    }

    /// `{ value, done }`
    pub fn create_iter_result_object(&mut self, value: Value, done: bool) -> Value {
        let object = self.ordinary_object();
        let record = self.heap.get_mut(object);
        record.define_data_property(PropertyKey::from("value"), value);
        record.define_data_property(PropertyKey::from("done"), Value::Boolean(done));
        Value::Object(object)
    }

    pub(crate) fn expect_object(&self, value: &Value) -> Result<ObjectId> {
        value
            .as_object()
            .ok_or_else(|| Error::InternalError(format!("expected an object, found {:?}", value)))
    }

    /// Elements of an engine-built array
    pub(crate) fn array_elements(&self, value: &Value) -> Result<Vec<Value>> {
        let id = self.expect_object(value)?;
        match &self.heap.get(id).kind {
            ObjectKind::Array(elements) => Ok(elements.clone()),
            _ => Err(Error::InternalError(format!("expected an array, found {:?}", value))),
        }
    }

    pub(crate) fn array_push(&mut self, array: &Value, value: Value) -> Result<()> {
        let id = self.expect_object(array)?;
        match &mut self.heap.get_mut(id).kind {
            ObjectKind::Array(elements) => {
                elements.push(value);
                Ok(())
            }
            _ => Err(Error::InternalError(format!("expected an array, found {:?}", array))),
        }
    }

    /// IsCallable
    pub fn is_callable(&self, value: &Value) -> bool {
        match value {
            Value::Object(id) => self.heap.get(*id).is_callable(),
            _ => false,
        }
    }

    /// IsConstructor
    pub fn is_constructor(&self, value: &Value) -> bool {
        match value {
            Value::Object(id) => self
                .heap
                .get(*id)
                .as_function()
                .is_some_and(|function| function.constructor_kind.is_some()),
            _ => false,
        }
    }

    /// The `typeof` operator
    pub fn type_of(&self, value: &Value) -> &'static str {
        match value {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Object(id) => {
                if self.heap.get(*id).is_callable() {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    /// Short description of a value for error messages
    pub fn describe(&self, value: &Value) -> String {
        match value {
            Value::Object(id) => {
                let object = self.heap.get(*id);
                match &object.kind {
                    ObjectKind::Function(function) => format!("function {}", function.name),
                    ObjectKind::NativeFunction(native) => format!("function {}", native.name),
                    ObjectKind::Array(_) => "[object Array]".to_string(),
                    _ => "[object Object]".to_string(),
                }
            }
            Value::String(s) => format!("\"{}\"", s),
            Value::Symbol(id) => format!("Symbol({})", self.heap.symbol_description(*id).unwrap_or_default()),
            other => other.to_js_string(),
        }
    }

    /// RequireObjectCoercible
    pub fn require_object_coercible(&self, value: &Value) -> Result<()> {
        if value.is_nullish() {
            return Err(Error::type_error(format!(
                "Cannot destructure '{}' as it is {}.",
                value, value
            )));
        }
        Ok(())
    }

    /// ToObject
    pub fn to_object(&mut self, value: &Value) -> Result<ObjectId> {
        let intrinsics = self.realm.intrinsics;
        let prototype = match value {
            Value::Object(id) => return Ok(*id),
            Value::Undefined | Value::Null => {
                return Err(Error::type_error(format!(
                    "Cannot convert {} to object",
                    value
                )))
            }
            Value::Boolean(_) => intrinsics.boolean_prototype,
            Value::Number(_) => intrinsics.number_prototype,
            Value::String(_) => intrinsics.string_prototype,
            Value::Symbol(_) => intrinsics.symbol_prototype,
        };
        Ok(self.heap.allocate(Object::with_kind(
            ObjectKind::PrimitiveWrapper(value.clone()),
            Some(prototype),
        )))
    }

    /// ToPrimitive without user-defined conversion hooks
    pub fn to_primitive(&self, value: &Value) -> Value {
        let Value::Object(id) = value else {
            return value.clone();
        };
        let object = self.heap.get(*id);
        match &object.kind {
            ObjectKind::PrimitiveWrapper(inner) => inner.clone(),
            ObjectKind::Array(elements) => Value::String(
                elements
                    .iter()
                    .map(|element| match element {
                        Value::Undefined | Value::Null => String::new(),
                        other => self.to_primitive(other).to_js_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            ObjectKind::Error(kind) => {
                let message = object
                    .get_own_property(&PropertyKey::from("message"))
                    .map(|p| p.value.to_js_string())
                    .unwrap_or_default();
                if message.is_empty() {
                    Value::String(kind.name().to_string())
                } else {
                    Value::String(format!("{}: {}", kind.name(), message))
                }
            }
            ObjectKind::Function(function) => {
                Value::String(format!("function {}() {{ [code] }}", function.name))
            }
            ObjectKind::NativeFunction(native) => {
                Value::String(format!("function {}() {{ [native code] }}", native.name))
            }
            _ => Value::String("[object Object]".to_string()),
        }
    }

    /// ToString
    pub fn to_string_value(&self, value: &Value) -> Result<String> {
        match self.to_primitive(value) {
            Value::Symbol(_) => Err(Error::type_error("Cannot convert a Symbol value to a string")),
            primitive => Ok(primitive.to_js_string()),
        }
    }

    /// ToNumber
    pub fn to_number_value(&self, value: &Value) -> Result<f64> {
        match self.to_primitive(value) {
            Value::Symbol(_) => Err(Error::type_error("Cannot convert a Symbol value to a number")),
            primitive => Ok(primitive.to_number()),
        }
    }

    /// ToPropertyKey
    pub fn to_property_key(&self, value: &Value) -> Result<PropertyKey> {
        match self.to_primitive(value) {
            Value::Symbol(id) => Ok(PropertyKey::Symbol(id)),
            Value::Number(n) => Ok(PropertyKey::String(number_to_string(n))),
            primitive => Ok(PropertyKey::String(primitive.to_js_string())),
        }
    }

    /// `[[Get]]` on an object, walking the prototype chain
    pub fn get(&self, object: ObjectId, key: &PropertyKey) -> Result<Value> {
        let mut current = Some(object);
        while let Some(id) = current {
            let record = self.heap.get(id);
            match &record.kind {
                ObjectKind::Array(elements) => {
                    if let Some(index) = key.as_array_index() {
                        if let Some(value) = elements.get(index) {
                            return Ok(value.clone());
                        }
                    } else if key.as_str() == Some("length") {
                        return Ok(Value::Number(elements.len() as f64));
                    }
                }
                ObjectKind::Arguments(arguments) => {
                    if let Some(index) = key.as_array_index() {
                        if record.get_own_property(key).is_some() {
                            if let Some((env, name)) = arguments.mapped_name(index) {
                                return self.heap.get_binding_value(env, name);
                            }
                        }
                    }
                    if arguments.is_unmapped() && key.as_str() == Some("callee") {
                        return Err(Error::type_error(messages::CALLEE_ACCESS));
                    }
                }
                _ => {}
            }
            if let Some(property) = record.get_own_property(key) {
                return Ok(property.value.clone());
            }
            current = record.prototype;
        }
        Ok(Value::Undefined)
    }

    /// GetV: property read on any value
    pub fn get_value_property(&self, base: &Value, key: &PropertyKey) -> Result<Value> {
        let intrinsics = self.realm.intrinsics;
        let prototype = match base {
            Value::Object(id) => return self.get(*id, key),
            Value::Undefined | Value::Null => {
                return Err(Error::type_error(messages::cannot_read_property(
                    &key.to_string(),
                    &base.to_js_string(),
                )))
            }
            Value::String(s) => {
                if key.as_str() == Some("length") {
                    return Ok(Value::Number(s.encode_utf16().count() as f64));
                }
                if let Some(index) = key.as_array_index() {
                    return Ok(s
                        .chars()
                        .nth(index)
                        .map(|c| Value::String(c.to_string()))
                        .unwrap_or_default());
                }
                intrinsics.string_prototype
            }
            Value::Boolean(_) => intrinsics.boolean_prototype,
            Value::Number(_) => intrinsics.number_prototype,
            Value::Symbol(id) => {
                if key.as_str() == Some("description") {
                    return Ok(self
                        .heap
                        .symbol_description(*id)
                        .map(Value::from)
                        .unwrap_or_default());
                }
                intrinsics.symbol_prototype
            }
        };
        self.get(prototype, key)
    }

    /// `[[Set]]` on an object; failures throw only in strict code
    pub fn set(&mut self, object: ObjectId, key: PropertyKey, value: Value, strict: bool) -> Result<()> {
        let record = self.heap.get_mut(object);
        match &mut record.kind {
            ObjectKind::Array(elements) => {
                if let Some(index) = key.as_array_index() {
                    if index >= elements.len() {
                        elements.resize(index + 1, Value::Undefined);
                    }
                    elements[index] = value;
                    return Ok(());
                }
                if key.as_str() == Some("length") {
                    let length = value.to_number();
                    if length < 0.0 || length.fract() != 0.0 || length > u32::MAX as f64 {
                        return Err(Error::range_error("Invalid array length"));
                    }
                    elements.resize(length as usize, Value::Undefined);
                    return Ok(());
                }
            }
            ObjectKind::Arguments(arguments) => {
                if let Some(index) = key.as_array_index() {
                    let mapped = arguments
                        .mapped_name(index)
                        .map(|(env, name)| (env, name.to_string()));
                    if let (Some((env, name)), Some(property)) = (mapped, record.properties.get_mut(&key)) {
                        property.value = value.clone();
                        return self.heap.set_mutable_binding(env, &name, value, false);
                    }
                }
            }
            _ => {}
        }

        if let Some(property) = record.properties.get_mut(&key) {
            if !property.writable {
                return read_only(&key, strict);
            }
            property.value = value;
            return Ok(());
        }
        let prototype = record.prototype;
        let inherited_read_only = prototype
            .and_then(|prototype| self.heap.lookup_property(prototype, &key))
            .is_some_and(|property| !property.writable);
        if inherited_read_only {
            return read_only(&key, strict);
        }
        self.heap.get_mut(object).define_data_property(key, value);
        Ok(())
    }

    /// PutValue for a property reference on any base value
    pub fn put_value_property(&mut self, base: &Value, key: PropertyKey, value: Value) -> Result<()> {
        let strict = self.running_context().is_strict;
        match base {
            Value::Object(id) => self.set(*id, key, value, strict),
            Value::Undefined | Value::Null => Err(Error::type_error(format!(
                "Cannot set property '{}' of {}",
                key, base
            ))),
            _ if strict => Err(Error::type_error(format!(
                "Cannot create property '{}' on {} '{}'",
                key,
                self.type_of(base),
                base
            ))),
            _ => Ok(()),
        }
    }

    /// DefinePropertyOrThrow
    pub fn define_property_or_throw(&mut self, object: ObjectId, key: PropertyKey, property: Property) -> Result<()> {
        let record = self.heap.get_mut(object);
        if let Some(existing) = record.get_own_property(&key) {
            if !existing.configurable {
                return Err(Error::type_error(format!("Cannot redefine property: {}", key)));
            }
        }
        if let ObjectKind::Array(elements) = &mut record.kind {
            if let Some(index) = key.as_array_index() {
                if index >= elements.len() {
                    elements.resize(index + 1, Value::Undefined);
                }
                elements[index] = property.value;
                return Ok(());
            }
        }
        record.define_property(key, property);
        Ok(())
    }

    /// CreateDataPropertyOrThrow
    pub fn create_data_property_or_throw(&mut self, object: ObjectId, key: PropertyKey, value: Value) -> Result<()> {
        self.define_property_or_throw(object, key, Property::data(value))
    }

    /// Own enumerable string keys with their values, in property order
    pub fn enumerable_own_properties(&self, object: ObjectId) -> Result<Vec<(PropertyKey, Value)>> {
        let keys = self.heap.get(object).own_property_keys();
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            if matches!(key, PropertyKey::Symbol(_)) {
                continue;
            }
            let record = self.heap.get(object);
            let enumerable = match (&record.kind, key.as_array_index()) {
                (ObjectKind::Array(elements), Some(index)) if index < elements.len() => true,
                (ObjectKind::Array(_), None) if key.as_str() == Some("length") => false,
                _ => record.get_own_property(&key).is_some_and(|p| p.enumerable),
            };
            if enumerable {
                let value = self.get(object, &key)?;
                entries.push((key, value));
            }
        }
        Ok(entries)
    }

    /// Drain an iterable into a list
    ///
    /// Arrays, strings, arguments objects and generator objects are iterable.
    pub fn iterate_to_list(&mut self, value: &Value) -> Result<Vec<Value>> {
        match value {
            Value::String(s) => return Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
            Value::Object(id) => match &self.heap.get(*id).kind {
                ObjectKind::Array(elements) => return Ok(elements.clone()),
                ObjectKind::Arguments(_) => {
                    let length = self.get(*id, &PropertyKey::from("length"))?.to_number();
                    let length = if length.is_nan() { 0 } else { length.max(0.0) as usize };
                    let mut values = Vec::with_capacity(length);
                    for index in 0..length {
                        values.push(self.get(*id, &PropertyKey::from(index))?);
                    }
                    return Ok(values);
                }
                ObjectKind::Generator(_) => {
                    let generator = *id;
                    let mut values = Vec::new();
                    loop {
                        let result = self.generator_resume(generator, ResumeInput::Next(Value::Undefined))?;
                        let done = self.get_value_property(&result, &PropertyKey::from("done"))?;
                        if done.to_boolean() {
                            return Ok(values);
                        }
                        values.push(self.get_value_property(&result, &PropertyKey::from("value"))?);
                    }
                }
                _ => {}
            },
            _ => {}
        }
        Err(Error::type_error(messages::not_iterable(&self.describe(value))))
    }

    /// Binary operators shared by both evaluation strategies
    pub fn apply_binary_operator(&self, operator: BinaryOperator, left: &Value, right: &Value) -> Result<Value> {
        match operator {
            BinaryOperator::StrictEq => return Ok(Value::Boolean(left.strict_equals(right))),
            BinaryOperator::StrictNe => return Ok(Value::Boolean(!left.strict_equals(right))),
            _ => {}
        }
        let left = self.to_primitive(left);
        let right = self.to_primitive(right);
        match operator {
            BinaryOperator::Add => {
                if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                    let mut s = self.to_string_value(&left)?;
                    s.push_str(&self.to_string_value(&right)?);
                    return Ok(Value::String(s));
                }
                Ok(Value::Number(self.to_number_value(&left)? + self.to_number_value(&right)?))
            }
            BinaryOperator::Sub => Ok(Value::Number(self.to_number_value(&left)? - self.to_number_value(&right)?)),
            BinaryOperator::Mul => Ok(Value::Number(self.to_number_value(&left)? * self.to_number_value(&right)?)),
            BinaryOperator::Div => Ok(Value::Number(self.to_number_value(&left)? / self.to_number_value(&right)?)),
            BinaryOperator::Lt | BinaryOperator::Gt | BinaryOperator::LtEq | BinaryOperator::GtEq => {
                if let (Value::String(a), Value::String(b)) = (&left, &right) {
                    let result = match operator {
                        BinaryOperator::Lt => a < b,
                        BinaryOperator::Gt => a > b,
                        BinaryOperator::LtEq => a <= b,
                        _ => a >= b,
                    };
                    return Ok(Value::Boolean(result));
                }
                let a = self.to_number_value(&left)?;
                let b = self.to_number_value(&right)?;
                let result = match operator {
                    BinaryOperator::Lt => a < b,
                    BinaryOperator::Gt => a > b,
                    BinaryOperator::LtEq => a <= b,
                    _ => a >= b,
                };
                Ok(Value::Boolean(result))
            }
            BinaryOperator::StrictEq | BinaryOperator::StrictNe => unreachable!("handled above"),
        }
    }

    /// GetPrototypeFromConstructor
    ///
    /// A non-object `prototype` falls back to `default`.
    pub fn get_prototype_from_constructor(&self, constructor: ObjectId, default: ObjectId) -> Result<ObjectId> {
        match self.get(constructor, &PropertyKey::from("prototype"))? {
            Value::Object(prototype) => Ok(prototype),
            _ => Ok(default),
        }
    }

    /// Call
    ///
    /// Every invocation, nested or not, passes through here or through
    /// [`VM::construct`], so these are where the native stack is grown.
    pub fn call(&mut self, callee: &Value, this_value: Value, arguments: Vec<Value>) -> Result<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT_SIZE, || {
            self.call_on_stack(callee, this_value, arguments)
        })
    }

    fn call_on_stack(&mut self, callee: &Value, this_value: Value, arguments: Vec<Value>) -> Result<Value> {
        let Some(id) = callee.as_object().filter(|id| self.heap.get(*id).is_callable()) else {
            return Err(Error::type_error(messages::not_a_function(&self.describe(callee))));
        };
        let native = match &self.heap.get(id).kind {
            ObjectKind::NativeFunction(native) => native.clone(),
            _ => return self.internal_call(id, this_value, arguments),
        };
        self.call_native(&native, this_value, arguments)
    }

    fn call_native(&mut self, native: &NativeFunction, this_value: Value, arguments: Vec<Value>) -> Result<Value> {
        trace!(function = %native.name, argc = arguments.len(), "native call");
        match &native.behaviour {
            NativeBehaviour::Builtin(behaviour) => behaviour(self, &this_value, &arguments, &native.captures),
            NativeBehaviour::Host(behaviour) => behaviour(self, &this_value, &arguments),
        }
    }

    /// Construct; `new_target` defaults to the constructor itself
    pub fn construct(&mut self, constructor: &Value, arguments: Vec<Value>, new_target: Option<ObjectId>) -> Result<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT_SIZE, || {
            self.construct_on_stack(constructor, arguments, new_target)
        })
    }

    fn construct_on_stack(
        &mut self,
        constructor: &Value,
        arguments: Vec<Value>,
        new_target: Option<ObjectId>,
    ) -> Result<Value> {
        if !self.is_constructor(constructor) {
            return Err(Error::type_error(messages::not_a_constructor(&self.describe(constructor))));
        }
        let id = self.expect_object(constructor)?;
        self.internal_construct(id, arguments, new_target.unwrap_or(id))
    }

    /// ResolveThisBinding
    pub fn resolve_this_binding(&self) -> Result<Value> {
        let env = self
            .heap
            .get_this_environment(self.running_context().lexical_environment);
        self.heap.get_this_binding(env)
    }

    /// BlockDeclarationInstantiation, entering the block's environment
    pub fn enter_block_scope(&mut self, scope: &BlockScope) -> Result<()> {
        let outer = self.running_context().lexical_environment;
        let env = self
            .heap
            .allocate_environment(Environment::declarative(Some(outer)));
        for declaration in &scope.lexical_declarations {
            if declaration.is_constant {
                must(
                    self.heap.create_immutable_binding(env, &declaration.name, true),
                    "block declaration instantiation",
                );
            } else {
                must(
                    self.heap.create_mutable_binding(env, &declaration.name),
                    "block declaration instantiation",
                );
            }
        }
        self.running_context_mut().lexical_environment = env;
        for function in &scope.functions {
            let closure = self.instantiate_function_object(function, env);
            if self.heap.environment(env).bindings.contains_key(&function.name) {
                // A later declaration of the same name replaces the earlier one
                let initialized = self.heap.environment(env).bindings[&function.name].value.is_some();
                if initialized {
                    self.heap
                        .set_mutable_binding(env, &function.name, Value::Object(closure), false)?;
                    continue;
                }
            } else {
                must(
                    self.heap.create_mutable_binding(env, &function.name),
                    "block declaration instantiation",
                );
            }
            self.heap
                .initialize_binding(env, &function.name, Value::Object(closure))?;
        }
        Ok(())
    }

    /// Leave the innermost block environment
    pub fn leave_block_scope(&mut self) -> Result<()> {
        let current = self.running_context().lexical_environment;
        let outer = self
            .heap
            .environment(current)
            .outer
            .ok_or_else(|| Error::InternalError("leaving a scope without an outer environment".to_string()))?;
        self.running_context_mut().lexical_environment = outer;
        Ok(())
    }

    /// Copy a block-level function to the variable environment when its
    /// declaration is evaluated (sloppy-mode web compatibility)
    pub fn annex_b_copy(&mut self, name: &str) -> Result<()> {
        let context = self.running_context();
        if !context.annex_b_function_names.iter().any(|n| n == name) {
            return Ok(());
        }
        let (lexical, variable) = (context.lexical_environment, context.variable_environment);
        let value = self.heap.get_binding_value(lexical, name)?;
        self.heap.set_mutable_binding(variable, name, value, false)
    }
}

fn read_only(key: &PropertyKey, strict: bool) -> Result<()> {
    if strict {
        Err(Error::type_error(messages::read_only_property(&key.to_string())))
    } else {
        Ok(())
    }
}
