//! Object model subset
//!
//! Objects live in the [`Heap`](crate::gc::Heap) and own an ordered property
//! table. Definition order is observable (`own_property_keys`), so the table
//! is an `IndexMap` keyed with the fx hasher.

use super::function::FunctionObject;
use super::generator::GeneratorObject;
use super::promise::PromiseState;
use super::value::{PropertyKey, Value};
use super::VM;
use crate::error::{ErrorKind, Result};
use crate::gc::{EnvironmentId, Heap, ObjectId, Trace, Visitor};
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use std::fmt;
use std::rc::Rc;

/// A data property
#[derive(Debug, Clone)]
pub struct Property {
    pub value: Value,
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
}

impl Property {
    /// Writable, enumerable and configurable
    pub fn data(value: Value) -> Self {
        Self::with_attributes(value, true, true, true)
    }

    /// Writable and configurable but hidden from enumeration (methods, `constructor`)
    pub fn hidden(value: Value) -> Self {
        Self::with_attributes(value, true, false, true)
    }

    /// Explicit attributes
    pub fn with_attributes(value: Value, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Self {
            value,
            writable,
            enumerable,
            configurable,
        }
    }
}

/// Ordered own-property table
pub type PropertyMap = IndexMap<PropertyKey, Property, FxBuildHasher>;

/// Signature of engine-provided natives: `(vm, this, arguments, captures)`
pub type BuiltinFn = fn(&mut VM, &Value, &[Value], &[Value]) -> Result<Value>;

/// Signature of embedder-registered natives: `(vm, this, arguments)`
pub type HostFn = Rc<dyn Fn(&mut VM, &Value, &[Value]) -> Result<Value>>;

/// How a native function is implemented
#[derive(Clone)]
pub enum NativeBehaviour {
    /// Engine builtin
    Builtin(BuiltinFn),
    /// Closure registered by the embedder
    Host(HostFn),
}

/// A function implemented in Rust
#[derive(Clone)]
pub struct NativeFunction {
    /// Name reported in stack traces
    pub name: String,
    pub behaviour: NativeBehaviour,
    /// Values the builtin closes over (traced)
    pub captures: Vec<Value>,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Native: {}]", self.name)
    }
}

/// Live aliasing between indexed slots and parameter bindings
#[derive(Debug, Clone)]
pub struct ArgumentsMapping {
    /// Environment holding the parameter bindings
    pub environment: EnvironmentId,
    /// Parameter name aliased by each index (`None` where unmapped)
    pub names: Vec<Option<String>>,
}

/// An arguments object
#[derive(Debug, Clone)]
pub struct ArgumentsObject {
    /// `Some` for mapped arguments objects
    pub mapping: Option<ArgumentsMapping>,
}

impl ArgumentsObject {
    /// The parameter aliased by `index`, for mapped objects
    pub fn mapped_name(&self, index: usize) -> Option<(EnvironmentId, &str)> {
        let mapping = self.mapping.as_ref()?;
        let name = mapping.names.get(index)?.as_deref()?;
        Some((mapping.environment, name))
    }

    /// Whether this is an unmapped (strict) arguments object
    pub fn is_unmapped(&self) -> bool {
        self.mapping.is_none()
    }
}

/// Object kind
#[derive(Debug)]
pub enum ObjectKind {
    /// Ordinary object
    Ordinary,
    /// User-defined function
    Function(Box<FunctionObject>),
    /// Native function
    NativeFunction(NativeFunction),
    /// Array with dense elements
    Array(Vec<Value>),
    /// Arguments object
    Arguments(ArgumentsObject),
    /// Error instance
    Error(ErrorKind),
    /// Boxed primitive (`Object(1)`)
    PrimitiveWrapper(Value),
    /// Promise
    Promise(PromiseState),
    /// Generator instance
    Generator(Box<GeneratorObject>),
}

/// JavaScript object
#[derive(Debug)]
pub struct Object {
    /// Object kind
    pub kind: ObjectKind,
    /// Own properties in definition order
    pub properties: PropertyMap,
    /// Prototype
    pub prototype: Option<ObjectId>,
}

impl Object {
    /// Create an ordinary object
    pub fn ordinary(prototype: Option<ObjectId>) -> Self {
        Self::with_kind(ObjectKind::Ordinary, prototype)
    }

    /// Create an object of the given kind
    pub fn with_kind(kind: ObjectKind, prototype: Option<ObjectId>) -> Self {
        Self {
            kind,
            properties: PropertyMap::default(),
            prototype,
        }
    }

    /// Define (or redefine) an own property; a redefined key keeps its position
    pub fn define_property(&mut self, key: PropertyKey, property: Property) {
        self.properties.insert(key, property);
    }

    /// Define a writable, enumerable, configurable data property
    pub fn define_data_property(&mut self, key: PropertyKey, value: Value) {
        self.define_property(key, Property::data(value));
    }

    /// Own data property
    pub fn get_own_property(&self, key: &PropertyKey) -> Option<&Property> {
        self.properties.get(key)
    }

    /// Whether the object is callable
    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_) | ObjectKind::NativeFunction(_))
    }

    /// The user-defined function payload
    pub fn as_function(&self) -> Option<&FunctionObject> {
        match &self.kind {
            ObjectKind::Function(function) => Some(function),
            _ => None,
        }
    }

    /// The user-defined function payload, mutably
    pub fn as_function_mut(&mut self) -> Option<&mut FunctionObject> {
        match &mut self.kind {
            ObjectKind::Function(function) => Some(function),
            _ => None,
        }
    }

    /// OrdinaryOwnPropertyKeys: integer indices ascending, then strings and
    /// symbols each in definition order
    pub fn own_property_keys(&self) -> Vec<PropertyKey> {
        let mut indices: Vec<usize> = self
            .properties
            .keys()
            .filter_map(PropertyKey::as_array_index)
            .collect();
        if let ObjectKind::Array(elements) = &self.kind {
            indices.extend(0..elements.len());
        }
        indices.sort_unstable();
        indices.dedup();

        let mut keys: Vec<PropertyKey> = indices.into_iter().map(PropertyKey::from).collect();
        if matches!(self.kind, ObjectKind::Array(_)) {
            keys.push(PropertyKey::from("length"));
        }
        keys.extend(
            self.properties
                .keys()
                .filter(|k| matches!(k, PropertyKey::String(_)) && k.as_array_index().is_none())
                .cloned(),
        );
        keys.extend(
            self.properties
                .keys()
                .filter(|k| matches!(k, PropertyKey::Symbol(_)))
                .cloned(),
        );
        keys
    }
}

impl Trace for Object {
    fn trace(&self, visitor: &mut Visitor) {
        if let Some(prototype) = self.prototype {
            visitor.visit_object(prototype);
        }
        for (key, property) in &self.properties {
            if let PropertyKey::Symbol(symbol) = key {
                visitor.visit_symbol(*symbol);
            }
            visitor.visit_value(&property.value);
        }
        match &self.kind {
            ObjectKind::Ordinary | ObjectKind::Error(_) => {}
            ObjectKind::Function(function) => function.trace(visitor),
            ObjectKind::NativeFunction(native) => visitor.visit_values(&native.captures),
            ObjectKind::Array(elements) => visitor.visit_values(elements),
            ObjectKind::Arguments(arguments) => {
                if let Some(mapping) = &arguments.mapping {
                    visitor.visit_environment(mapping.environment);
                }
            }
            ObjectKind::PrimitiveWrapper(value) => visitor.visit_value(value),
            ObjectKind::Promise(state) => state.trace(visitor),
            ObjectKind::Generator(generator) => generator.trace(visitor),
        }
    }
}

impl Heap {
    /// Find a data property on an object or its prototype chain
    pub fn lookup_property(&self, object: ObjectId, key: &PropertyKey) -> Option<&Property> {
        let mut current = Some(object);
        while let Some(id) = current {
            let object = self.get(id);
            if let Some(property) = object.get_own_property(key) {
                return Some(property);
            }
            current = object.prototype;
        }
        None
    }

    /// Whether a property exists on an object or its prototype chain
    pub fn has_property(&self, object: ObjectId, key: &PropertyKey) -> bool {
        self.lookup_property(object, key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_own_property_keys_order() {
        let mut object = Object::ordinary(None);
        object.define_data_property(PropertyKey::from("b"), Value::Null);
        object.define_data_property(PropertyKey::from("2"), Value::Null);
        object.define_data_property(PropertyKey::from("a"), Value::Null);
        object.define_data_property(PropertyKey::from("0"), Value::Null);

        let keys: Vec<String> = object.own_property_keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["0", "2", "b", "a"]);
    }

    #[test]
    fn test_redefinition_keeps_position() {
        let mut object = Object::ordinary(None);
        object.define_data_property(PropertyKey::from("length"), Value::Number(0.0));
        object.define_data_property(PropertyKey::from("name"), Value::from("f"));
        object.define_property(
            PropertyKey::from("length"),
            Property::with_attributes(Value::Number(1.0), false, false, true),
        );

        let keys: Vec<String> = object.own_property_keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["length", "name"]);
        assert!(!object.get_own_property(&PropertyKey::from("length")).unwrap().writable);
    }

    #[test]
    fn test_array_keys_include_elements_and_length() {
        let object = Object::with_kind(ObjectKind::Array(vec![Value::Null, Value::Null]), None);
        let keys: Vec<String> = object.own_property_keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["0", "1", "length"]);
    }

    #[test]
    fn test_prototype_chain_lookup() {
        let mut heap = Heap::default();
        let parent = heap.allocate(Object::ordinary(None));
        heap.get_mut(parent)
            .define_data_property(PropertyKey::from("inherited"), Value::from(1));
        let child = heap.allocate(Object::ordinary(Some(parent)));

        assert!(heap.has_property(child, &PropertyKey::from("inherited")));
        assert!(!heap.has_property(child, &PropertyKey::from("missing")));
    }
}
