//! Environment records
//!
//! Declarative, function and global records chained through `outer` links.
//! Records live in the heap so closures, contexts and arguments objects can
//! share them freely.

use super::value::{PropertyKey, Value};
use super::VM;
use crate::error::{messages, Error, Result};
use crate::gc::{EnvironmentId, Heap, ObjectId, Trace, Visitor};
use crate::runtime::object::Property;
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// A single binding
#[derive(Debug, Clone)]
pub struct Binding {
    /// `None` until initialized (temporal dead zone)
    pub value: Option<Value>,
    pub mutable: bool,
    /// Immutable binding that throws on assignment even in sloppy code
    pub strict: bool,
}

/// State of a function environment's `this`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThisBindingStatus {
    /// Arrow functions have no own `this`
    Lexical,
    Initialized,
    Uninitialized,
}

/// The extra slots of a function environment
#[derive(Debug, Clone)]
pub struct FunctionEnvironment {
    pub this_binding_status: ThisBindingStatus,
    pub this_value: Value,
    /// The function whose invocation created this environment
    pub function: ObjectId,
    pub new_target: Option<ObjectId>,
}

/// Environment record kind
#[derive(Debug, Clone)]
pub enum EnvironmentKind {
    Declarative,
    Function(FunctionEnvironment),
    /// Global record: declarative part in `bindings`, object part on `global_object`
    Global { global_object: ObjectId },
}

/// An environment record
#[derive(Debug, Clone)]
pub struct Environment {
    pub kind: EnvironmentKind,
    pub bindings: FxHashMap<String, Binding>,
    pub outer: Option<EnvironmentId>,
}

impl Environment {
    /// New declarative record
    pub fn declarative(outer: Option<EnvironmentId>) -> Self {
        Self {
            kind: EnvironmentKind::Declarative,
            bindings: FxHashMap::default(),
            outer,
        }
    }

    /// New function record; arrow functions get a lexical `this`
    pub fn function(
        function: ObjectId,
        is_lexical_this: bool,
        new_target: Option<ObjectId>,
        outer: EnvironmentId,
    ) -> Self {
        let this_binding_status = if is_lexical_this {
            ThisBindingStatus::Lexical
        } else {
            ThisBindingStatus::Uninitialized
        };
        Self {
            kind: EnvironmentKind::Function(FunctionEnvironment {
                this_binding_status,
                this_value: Value::Undefined,
                function,
                new_target,
            }),
            bindings: FxHashMap::default(),
            outer: Some(outer),
        }
    }

    /// New global record
    pub fn global(global_object: ObjectId) -> Self {
        Self {
            kind: EnvironmentKind::Global { global_object },
            bindings: FxHashMap::default(),
            outer: None,
        }
    }

    /// The function slots, if this is a function record
    pub fn as_function(&self) -> Option<&FunctionEnvironment> {
        match &self.kind {
            EnvironmentKind::Function(function) => Some(function),
            _ => None,
        }
    }

    fn global_object(&self) -> Option<ObjectId> {
        match self.kind {
            EnvironmentKind::Global { global_object } => Some(global_object),
            _ => None,
        }
    }
}

impl Trace for Environment {
    fn trace(&self, visitor: &mut Visitor) {
        if let Some(outer) = self.outer {
            visitor.visit_environment(outer);
        }
        for binding in self.bindings.values() {
            if let Some(value) = &binding.value {
                visitor.visit_value(value);
            }
        }
        match &self.kind {
            EnvironmentKind::Declarative => {}
            EnvironmentKind::Function(function) => {
                visitor.visit_value(&function.this_value);
                visitor.visit_object(function.function);
                if let Some(new_target) = function.new_target {
                    visitor.visit_object(new_target);
                }
            }
            EnvironmentKind::Global { global_object } => visitor.visit_object(*global_object),
        }
    }
}

/// Private names declared by the enclosing classes
#[derive(Debug, Clone, Default)]
pub struct PrivateEnvironment {
    pub outer: Option<Rc<PrivateEnvironment>>,
    pub names: Vec<String>,
}

impl PrivateEnvironment {
    /// New private scope nested in `outer`
    pub fn new(outer: Option<Rc<PrivateEnvironment>>) -> Self {
        Self {
            outer,
            names: Vec::new(),
        }
    }
}

impl Heap {
    /// HasBinding
    pub fn has_binding(&self, env: EnvironmentId, name: &str) -> bool {
        let environment = self.environment(env);
        if environment.bindings.contains_key(name) {
            return true;
        }
        match environment.global_object() {
            Some(global) => self.has_property(global, &PropertyKey::from(name)),
            None => false,
        }
    }

    fn create_binding(&mut self, env: EnvironmentId, name: &str, binding: Binding) -> Result<()> {
        let environment = self.environment_mut(env);
        if environment.bindings.contains_key(name) {
            return Err(Error::InternalError(format!(
                "binding '{}' already exists in {:?}",
                name, env
            )));
        }
        environment.bindings.insert(name.to_string(), binding);
        Ok(())
    }

    /// CreateMutableBinding
    pub fn create_mutable_binding(&mut self, env: EnvironmentId, name: &str) -> Result<()> {
        self.create_binding(
            env,
            name,
            Binding {
                value: None,
                mutable: true,
                strict: false,
            },
        )
    }

    /// CreateImmutableBinding
    pub fn create_immutable_binding(&mut self, env: EnvironmentId, name: &str, strict: bool) -> Result<()> {
        self.create_binding(
            env,
            name,
            Binding {
                value: None,
                mutable: false,
                strict,
            },
        )
    }

    /// InitializeBinding
    pub fn initialize_binding(&mut self, env: EnvironmentId, name: &str, value: Value) -> Result<()> {
        let environment = self.environment_mut(env);
        if let Some(binding) = environment.bindings.get_mut(name) {
            if binding.value.is_some() {
                return Err(Error::InternalError(format!(
                    "binding '{}' initialized twice",
                    name
                )));
            }
            binding.value = Some(value);
            return Ok(());
        }
        match environment.global_object() {
            Some(global) => {
                self.get_mut(global)
                    .define_data_property(PropertyKey::from(name), value);
                Ok(())
            }
            None => Err(Error::InternalError(format!(
                "initializing missing binding '{}'",
                name
            ))),
        }
    }

    /// SetMutableBinding
    pub fn set_mutable_binding(
        &mut self,
        env: EnvironmentId,
        name: &str,
        value: Value,
        strict: bool,
    ) -> Result<()> {
        let environment = self.environment_mut(env);
        let global = environment.global_object();
        match environment.bindings.get_mut(name) {
            Some(binding) => {
                if binding.value.is_none() {
                    return Err(Error::reference_error(messages::before_initialization(name)));
                }
                if binding.mutable {
                    binding.value = Some(value);
                    Ok(())
                } else if strict || binding.strict {
                    Err(Error::type_error(messages::assignment_to_constant(name)))
                } else {
                    Ok(())
                }
            }
            None => match global {
                Some(global) => self.set_global_property(global, name, value, strict),
                None => {
                    if strict {
                        return Err(Error::reference_error(messages::not_defined(name)));
                    }
                    let environment = self.environment_mut(env);
                    environment.bindings.insert(
                        name.to_string(),
                        Binding {
                            value: Some(value),
                            mutable: true,
                            strict: false,
                        },
                    );
                    Ok(())
                }
            },
        }
    }

    fn set_global_property(&mut self, global: ObjectId, name: &str, value: Value, strict: bool) -> Result<()> {
        let key = PropertyKey::from(name);
        let exists = self.has_property(global, &key);
        if !exists && strict {
            return Err(Error::reference_error(messages::not_defined(name)));
        }
        let object = self.get_mut(global);
        match object.properties.get_mut(&key) {
            Some(property) if !property.writable => {
                if strict {
                    Err(Error::type_error(messages::read_only_property(name)))
                } else {
                    Ok(())
                }
            }
            Some(property) => {
                property.value = value;
                Ok(())
            }
            None => {
                object.define_property(key, Property::data(value));
                Ok(())
            }
        }
    }

    /// GetBindingValue
    pub fn get_binding_value(&self, env: EnvironmentId, name: &str) -> Result<Value> {
        let environment = self.environment(env);
        if let Some(binding) = environment.bindings.get(name) {
            return binding
                .value
                .clone()
                .ok_or_else(|| Error::reference_error(messages::before_initialization(name)));
        }
        if let Some(global) = environment.global_object() {
            if let Some(property) = self.lookup_property(global, &PropertyKey::from(name)) {
                return Ok(property.value.clone());
            }
        }
        Err(Error::reference_error(messages::not_defined(name)))
    }

    /// Walk the chain for the record holding `name`
    pub fn resolve_binding(&self, env: EnvironmentId, name: &str) -> Option<EnvironmentId> {
        let mut current = Some(env);
        while let Some(id) = current {
            if self.has_binding(id, name) {
                return Some(id);
            }
            current = self.environment(id).outer;
        }
        None
    }

    /// HasThisBinding
    pub fn has_this_binding(&self, env: EnvironmentId) -> bool {
        match &self.environment(env).kind {
            EnvironmentKind::Declarative => false,
            EnvironmentKind::Function(function) => {
                function.this_binding_status != ThisBindingStatus::Lexical
            }
            EnvironmentKind::Global { .. } => true,
        }
    }

    /// GetThisEnvironment: nearest record that binds `this`
    pub fn get_this_environment(&self, env: EnvironmentId) -> EnvironmentId {
        let mut current = env;
        loop {
            if self.has_this_binding(current) {
                return current;
            }
            match self.environment(current).outer {
                Some(outer) => current = outer,
                None => return current,
            }
        }
    }

    /// BindThisValue
    pub fn bind_this_value(&mut self, env: EnvironmentId, value: Value) -> Result<()> {
        match &mut self.environment_mut(env).kind {
            EnvironmentKind::Function(function) => match function.this_binding_status {
                ThisBindingStatus::Lexical => Err(Error::InternalError(
                    "binding this in a lexical-this environment".to_string(),
                )),
                ThisBindingStatus::Initialized => {
                    Err(Error::reference_error(messages::SUPER_CALL_TWICE))
                }
                ThisBindingStatus::Uninitialized => {
                    function.this_value = value;
                    function.this_binding_status = ThisBindingStatus::Initialized;
                    Ok(())
                }
            },
            _ => Err(Error::InternalError(
                "binding this outside a function environment".to_string(),
            )),
        }
    }

    /// GetThisBinding
    pub fn get_this_binding(&self, env: EnvironmentId) -> Result<Value> {
        match &self.environment(env).kind {
            EnvironmentKind::Function(function) => match function.this_binding_status {
                ThisBindingStatus::Initialized => Ok(function.this_value.clone()),
                ThisBindingStatus::Uninitialized => {
                    Err(Error::reference_error(messages::SUPER_CALL_REQUIRED))
                }
                ThisBindingStatus::Lexical => Err(Error::InternalError(
                    "lexical-this environment has no this binding".to_string(),
                )),
            },
            EnvironmentKind::Global { global_object } => Ok(Value::Object(*global_object)),
            EnvironmentKind::Declarative => Err(Error::InternalError(
                "declarative environment has no this binding".to_string(),
            )),
        }
    }
}

/// Where a resolved identifier lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceBase {
    Environment(EnvironmentId),
    Unresolvable,
}

/// An identifier reference
#[derive(Debug, Clone)]
pub struct Reference {
    pub base: ReferenceBase,
    pub name: String,
    pub strict: bool,
}

impl VM {
    /// ResolveBinding against `env`, or the running lexical environment
    pub fn resolve_reference(&self, name: &str, env: Option<EnvironmentId>) -> Reference {
        let context = self.running_context();
        let env = env.unwrap_or(context.lexical_environment);
        let base = match self.heap.resolve_binding(env, name) {
            Some(id) => ReferenceBase::Environment(id),
            None => ReferenceBase::Unresolvable,
        };
        Reference {
            base,
            name: name.to_string(),
            strict: context.is_strict,
        }
    }

    /// GetValue
    pub fn get_reference_value(&self, reference: &Reference) -> Result<Value> {
        match reference.base {
            ReferenceBase::Environment(env) => self.heap.get_binding_value(env, &reference.name),
            ReferenceBase::Unresolvable => {
                Err(Error::reference_error(messages::not_defined(&reference.name)))
            }
        }
    }

    /// PutValue
    pub fn put_value(&mut self, reference: &Reference, value: Value) -> Result<()> {
        match reference.base {
            ReferenceBase::Environment(env) => {
                self.heap
                    .set_mutable_binding(env, &reference.name, value, reference.strict)
            }
            ReferenceBase::Unresolvable => {
                if reference.strict {
                    return Err(Error::reference_error(messages::not_defined(&reference.name)));
                }
                let global = self.realm.global_object;
                self.heap
                    .get_mut(global)
                    .define_data_property(PropertyKey::from(reference.name.as_str()), value);
                Ok(())
            }
        }
    }

    /// InitializeReferencedBinding
    pub fn initialize_referenced_binding(&mut self, reference: &Reference, value: Value) -> Result<()> {
        match reference.base {
            ReferenceBase::Environment(env) => {
                self.heap.initialize_binding(env, &reference.name, value)
            }
            ReferenceBase::Unresolvable => Err(Error::InternalError(format!(
                "initializing unresolvable reference '{}'",
                reference.name
            ))),
        }
    }
}
