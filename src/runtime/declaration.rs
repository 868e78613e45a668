//! FunctionDeclarationInstantiation and binding initialization
//!
//! Runs once per invocation after the callee context is pushed and before
//! the body executes. It decides which environment hosts the parameters,
//! the `var` declarations and the lexical declarations, creates the
//! arguments object when the body can observe one, binds every parameter
//! and hoists the top-level function declarations.

use super::environment::Environment;
use super::function::{FunctionRole, ThisMode};
use super::object::{ArgumentsMapping, ArgumentsObject, Object, ObjectKind, Property};
use super::value::{PropertyKey, Value};
use super::VM;
use crate::ast::{FunctionNode, ParameterBinding, Pattern, PropertyName, Script};
use crate::error::{messages, must, Error, Result};
use crate::gc::{EnvironmentId, ObjectId};
use rustc_hash::FxHashSet;
use std::rc::Rc;
use tracing::debug;

/// Whether default-value expressions run while binding parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultEvaluation {
    /// Evaluate defaults with the tree-walking interpreter
    Evaluate,
    /// Compiled bodies do not evaluate defaults; they bind `undefined`
    Skip,
}

impl VM {
    /// FunctionDeclarationInstantiation for the running context's function
    pub fn function_declaration_instantiation(
        &mut self,
        function: ObjectId,
        defaults: DefaultEvaluation,
    ) -> Result<()> {
        let callee = self.function_object(function)?;
        let node = callee.node.clone();
        let strict = callee.is_strict();
        let is_lexical_this = callee.this_mode == ThisMode::Lexical;
        let has_simple_parameter_list = callee.has_simple_parameter_list();
        let might_need_arguments_object = callee.might_need_arguments_object();
        let contains_direct_eval = callee.contains_direct_eval();
        let scope = &node.scope;

        let context = self.running_context();
        let callee_environment = context.lexical_environment;
        let arguments = context.arguments.clone();

        let mut parameter_names: Vec<String> = Vec::new();
        let mut has_duplicates = false;
        let mut has_parameter_expressions = false;
        for parameter in &node.parameters {
            for name in parameter.bound_names() {
                if parameter_names.iter().any(|existing| existing == name) {
                    has_duplicates = true;
                } else {
                    parameter_names.push(name.to_string());
                }
            }
            has_parameter_expressions |= parameter.contains_expression();
        }

        let mut functions_to_initialize: Vec<Rc<FunctionNode>> = Vec::new();
        let mut function_names: FxHashSet<&str> = FxHashSet::default();
        for declaration in scope.function_declarations.iter().rev() {
            if function_names.insert(declaration.name.as_str()) {
                functions_to_initialize.push(declaration.clone());
            }
        }
        functions_to_initialize.reverse();

        let arguments_name = "arguments".to_string();
        let arguments_object_needed = if is_lexical_this || parameter_names.contains(&arguments_name) {
            false
        } else if !has_parameter_expressions
            && (function_names.contains("arguments")
                || scope.lexical_declarations.iter().any(|d| d.name == "arguments"))
        {
            false
        } else {
            might_need_arguments_object
        };

        let environment = if strict || !has_parameter_expressions {
            callee_environment
        } else {
            // Keeps closures in default expressions away from body declarations
            let environment = self
                .heap
                .allocate_environment(Environment::declarative(Some(callee_environment)));
            self.running_context_mut().lexical_environment = environment;
            environment
        };

        for name in &parameter_names {
            if self.heap.has_binding(environment, name) {
                continue;
            }
            must(
                self.heap.create_mutable_binding(environment, name),
                "parameter binding",
            );
            if has_duplicates {
                must(
                    self.heap.initialize_binding(environment, name, Value::Undefined),
                    "parameter binding",
                );
            }
        }

        if arguments_object_needed {
            let arguments_object = if strict || !has_simple_parameter_list {
                self.create_unmapped_arguments_object(&arguments)
            } else {
                self.create_mapped_arguments_object(function, &node, environment, &arguments)
            };
            if strict {
                must(
                    self.heap.create_immutable_binding(environment, "arguments", false),
                    "arguments binding",
                );
            } else {
                must(
                    self.heap.create_mutable_binding(environment, "arguments"),
                    "arguments binding",
                );
            }
            must(
                self.heap
                    .initialize_binding(environment, "arguments", Value::Object(arguments_object)),
                "arguments binding",
            );
            parameter_names.push(arguments_name);
        }

        for (index, parameter) in node.parameters.iter().enumerate() {
            let argument_value = if parameter.is_rest {
                let rest = arguments.get(index..).map(<[Value]>::to_vec).unwrap_or_default();
                Value::Object(self.create_array(rest))
            } else if let Some(value) = arguments.get(index).filter(|value| !value.is_undefined()) {
                value.clone()
            } else if let Some(default_value) = &parameter.default_value {
                match defaults {
                    DefaultEvaluation::Evaluate => match &parameter.binding {
                        ParameterBinding::Name(name) => self.evaluate_named(default_value, name)?,
                        ParameterBinding::Pattern(_) => self.evaluate_expression(default_value)?,
                    },
                    DefaultEvaluation::Skip => {
                        debug!(
                            function = %node.name,
                            parameter = index,
                            "default parameter value not evaluated in compiled code"
                        );
                        Value::Undefined
                    }
                }
            } else {
                Value::Undefined
            };

            // Duplicate names are assigned through an unresolved lookup so every
            // occurrence writes the same binding
            let target = if has_duplicates { None } else { Some(environment) };
            match &parameter.binding {
                ParameterBinding::Name(name) => {
                    let reference = self.resolve_reference(name, target);
                    if has_duplicates {
                        self.put_value(&reference, argument_value)?;
                    } else {
                        self.initialize_referenced_binding(&reference, argument_value)?;
                    }
                }
                ParameterBinding::Pattern(pattern) => {
                    self.binding_initialization(pattern, argument_value, target, defaults)?;
                }
            }
        }

        let mut instantiated_var_names: FxHashSet<String> = FxHashSet::default();
        let var_environment = if !has_parameter_expressions {
            for name in &scope.var_names {
                if parameter_names.contains(name) || !instantiated_var_names.insert(name.clone()) {
                    continue;
                }
                must(self.heap.create_mutable_binding(environment, name), "var binding");
                must(
                    self.heap.initialize_binding(environment, name, Value::Undefined),
                    "var binding",
                );
            }
            environment
        } else {
            let var_environment = self
                .heap
                .allocate_environment(Environment::declarative(Some(environment)));
            self.running_context_mut().variable_environment = var_environment;
            for name in &scope.var_names {
                if !instantiated_var_names.insert(name.clone()) {
                    continue;
                }
                must(self.heap.create_mutable_binding(var_environment, name), "var binding");
                let initial_value =
                    if !parameter_names.contains(name) || function_names.contains(name.as_str()) {
                        Value::Undefined
                    } else {
                        must(self.heap.get_binding_value(environment, name), "var binding")
                    };
                must(
                    self.heap.initialize_binding(var_environment, name, initial_value),
                    "var binding",
                );
            }
            var_environment
        };

        if !strict {
            for name in &scope.annex_b_candidates {
                if parameter_names.contains(name) {
                    continue;
                }
                if !instantiated_var_names.contains(name) && name != "arguments" {
                    must(
                        self.heap.create_mutable_binding(var_environment, name),
                        "block function hoisting",
                    );
                    must(
                        self.heap.initialize_binding(var_environment, name, Value::Undefined),
                        "block function hoisting",
                    );
                    instantiated_var_names.insert(name.clone());
                }
                self.running_context_mut().annex_b_function_names.push(name.clone());
            }
        }

        let lex_environment = if !strict && (contains_direct_eval || scope.has_lexical_declarations) {
            self.heap
                .allocate_environment(Environment::declarative(Some(var_environment)))
        } else {
            var_environment
        };
        self.running_context_mut().lexical_environment = lex_environment;

        for declaration in &scope.lexical_declarations {
            if declaration.is_constant {
                must(
                    self.heap
                        .create_immutable_binding(lex_environment, &declaration.name, true),
                    "lexical declaration",
                );
            } else {
                must(
                    self.heap.create_mutable_binding(lex_environment, &declaration.name),
                    "lexical declaration",
                );
            }
        }

        let private_environment = self.running_context().private_environment.clone();
        for declaration in functions_to_initialize {
            let closure = self.ordinary_function_create(
                &declaration,
                &declaration.name,
                lex_environment,
                private_environment.clone(),
                FunctionRole::Ordinary,
            );
            must(
                self.heap
                    .set_mutable_binding(var_environment, &declaration.name, Value::Object(closure), false),
                "function declaration hoisting",
            );
        }

        Ok(())
    }

    /// GlobalDeclarationInstantiation
    ///
    /// Lexical names go to the declarative part of the global record. Var
    /// and function names become properties of the global object; a later
    /// function declaration of the same name wins.
    pub fn global_declaration_instantiation(&mut self, script: &Script) -> Result<()> {
        let env = self.realm.global_environment;
        let global = self.realm.global_object;
        let scope = &script.scope;

        for name in &scope.var_names {
            if self.heap.environment(env).bindings.contains_key(name) {
                return Err(Error::syntax_error(messages::already_declared(name)));
            }
        }
        for declaration in &scope.lexical_declarations {
            let name = declaration.name.as_str();
            let restricted = self
                .heap
                .get(global)
                .get_own_property(&PropertyKey::from(name))
                .is_some_and(|property| !property.configurable);
            if restricted
                || self.heap.environment(env).bindings.contains_key(name)
                || scope.var_names.iter().any(|var| var == name)
            {
                return Err(Error::syntax_error(messages::already_declared(name)));
            }
        }

        for declaration in &scope.lexical_declarations {
            if declaration.is_constant {
                self.heap.create_immutable_binding(env, &declaration.name, true)?;
            } else {
                self.heap.create_mutable_binding(env, &declaration.name)?;
            }
        }

        let annex_b = if script.is_strict { &[][..] } else { &scope.annex_b_candidates[..] };
        for name in scope.var_names.iter().chain(annex_b) {
            let key = PropertyKey::from(name.as_str());
            if self.heap.get(global).get_own_property(&key).is_none() {
                self.heap.get_mut(global).define_data_property(key, Value::Undefined);
            }
        }
        for function in &scope.function_declarations {
            let closure = self.instantiate_function_object(function, env);
            self.create_data_property_or_throw(global, PropertyKey::from(function.name.as_str()), Value::Object(closure))?;
        }

        debug!(
            lexical = scope.lexical_declarations.len(),
            vars = scope.var_names.len(),
            functions = scope.function_declarations.len(),
            "global declaration instantiation"
        );
        Ok(())
    }

    /// CreateUnmappedArgumentsObject
    pub fn create_unmapped_arguments_object(&mut self, arguments: &[Value]) -> ObjectId {
        let mut object = Object::with_kind(
            ObjectKind::Arguments(ArgumentsObject { mapping: None }),
            Some(self.realm.intrinsics.object_prototype),
        );
        define_argument_slots(&mut object, arguments);
        object.define_property(
            PropertyKey::from("callee"),
            Property::with_attributes(Value::Undefined, false, false, false),
        );
        self.heap.allocate(object)
    }

    /// CreateMappedArgumentsObject
    ///
    /// Indexed slots below the argument count alias the parameter bindings
    /// in `environment`; for duplicate names the last parameter wins.
    pub fn create_mapped_arguments_object(
        &mut self,
        function: ObjectId,
        node: &FunctionNode,
        environment: EnvironmentId,
        arguments: &[Value],
    ) -> ObjectId {
        let mut names: Vec<Option<String>> = vec![None; arguments.len()];
        let mut mapped = FxHashSet::default();
        for (index, parameter) in node.parameters.iter().enumerate().rev() {
            let ParameterBinding::Name(name) = &parameter.binding else {
                continue;
            };
            if mapped.insert(name.as_str()) && index < arguments.len() {
                names[index] = Some(name.clone());
            }
        }

        let mut object = Object::with_kind(
            ObjectKind::Arguments(ArgumentsObject {
                mapping: Some(ArgumentsMapping { environment, names }),
            }),
            Some(self.realm.intrinsics.object_prototype),
        );
        define_argument_slots(&mut object, arguments);
        object.define_property(PropertyKey::from("callee"), Property::hidden(Value::Object(function)));
        self.heap.allocate(object)
    }

    /// BindingInitialization for a binding pattern
    ///
    /// With `environment` the bound names are initialized there; without one
    /// they are resolved from the running context and assigned.
    pub fn binding_initialization(
        &mut self,
        pattern: &Pattern,
        value: Value,
        environment: Option<EnvironmentId>,
        defaults: DefaultEvaluation,
    ) -> Result<()> {
        match pattern {
            Pattern::Identifier(name) => {
                let reference = self.resolve_reference(name, environment);
                match environment {
                    Some(_) => self.initialize_referenced_binding(&reference, value),
                    None => self.put_value(&reference, value),
                }
            }
            Pattern::Array(array) => {
                let values = self.iterate_to_list(&value)?;
                for (index, element) in array.elements.iter().enumerate() {
                    if let Some(element) = element {
                        let item = values.get(index).cloned().unwrap_or_default();
                        self.binding_initialization(element, item, environment, defaults)?;
                    }
                }
                if let Some(rest) = &array.rest {
                    let remaining = values
                        .get(array.elements.len()..)
                        .map(<[Value]>::to_vec)
                        .unwrap_or_default();
                    let rest_array = self.create_array(remaining);
                    self.binding_initialization(rest, Value::Object(rest_array), environment, defaults)?;
                }
                Ok(())
            }
            Pattern::Object(object) => {
                self.require_object_coercible(&value)?;
                let mut excluded = Vec::with_capacity(object.properties.len());
                for property in &object.properties {
                    let key = match &property.key {
                        PropertyName::Identifier(name) => PropertyKey::from(name.as_str()),
                        PropertyName::Computed(expression) => match defaults {
                            DefaultEvaluation::Evaluate => {
                                let key = self.evaluate_expression(expression)?;
                                self.to_property_key(&key)?
                            }
                            DefaultEvaluation::Skip => {
                                return Err(Error::not_implemented(
                                    "Computed keys in parameter patterns of compiled functions",
                                ))
                            }
                        },
                    };
                    let item = self.get_value_property(&value, &key)?;
                    excluded.push(key);
                    self.binding_initialization(&property.value, item, environment, defaults)?;
                }
                if let Some(rest) = &object.rest {
                    let source = self.to_object(&value)?;
                    let target = self.ordinary_object();
                    for (key, item) in self.enumerable_own_properties(source)? {
                        if !excluded.contains(&key) {
                            self.create_data_property_or_throw(target, key, item)?;
                        }
                    }
                    self.binding_initialization(rest, Value::Object(target), environment, defaults)?;
                }
                Ok(())
            }
            Pattern::Assignment(assignment) => {
                let value = if !value.is_undefined() {
                    value
                } else {
                    match defaults {
                        DefaultEvaluation::Evaluate => match &assignment.left {
                            Pattern::Identifier(name) => self.evaluate_named(&assignment.right, name)?,
                            _ => self.evaluate_expression(&assignment.right)?,
                        },
                        DefaultEvaluation::Skip => {
                            debug!("pattern default value not evaluated in compiled code");
                            Value::Undefined
                        }
                    }
                };
                self.binding_initialization(&assignment.left, value, environment, defaults)
            }
        }
    }
}

fn define_argument_slots(object: &mut Object, arguments: &[Value]) {
    for (index, value) in arguments.iter().enumerate() {
        object.define_data_property(PropertyKey::from(index), value.clone());
    }
    object.define_property(
        PropertyKey::from("length"),
        Property::hidden(Value::Number(arguments.len() as f64)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::*;
    use crate::ast::FunctionKind;

    /// Push a context for `node` as the callee would and run instantiation
    fn instantiate(vm: &mut VM, node: &Rc<FunctionNode>, arguments: Vec<Value>) -> ObjectId {
        let env = vm.realm.global_environment;
        let function = vm.instantiate_function_object(node, env);
        let callee_env = vm.prepare_for_ordinary_call(function, None, arguments).unwrap();
        vm.ordinary_call_bind_this(function, callee_env, Value::Undefined).unwrap();
        vm.function_declaration_instantiation(function, DefaultEvaluation::Evaluate)
            .unwrap();
        function
    }

    fn lookup(vm: &VM, name: &str) -> Value {
        let reference = vm.resolve_reference(name, None);
        vm.get_reference_value(&reference).unwrap()
    }

    #[test]
    fn test_duplicate_parameters_last_wins() {
        let mut vm = VM::default();
        let node = function("f", &["a", "a"], vec![]);
        instantiate(&mut vm, &node, vec![Value::from(1), Value::from(2)]);
        assert_eq!(lookup(&vm, "a"), Value::from(2));
    }

    #[test]
    fn test_missing_arguments_are_undefined() {
        let mut vm = VM::default();
        let node = function("f", &["a", "b"], vec![]);
        instantiate(&mut vm, &node, vec![Value::from(1)]);
        assert_eq!(lookup(&vm, "b"), Value::Undefined);
    }

    #[test]
    fn test_rest_parameter_collects_remaining() {
        let mut vm = VM::default();
        let node = function_with(
            "f",
            vec![param("a"), rest_param("rest")],
            vec![],
            FunctionKind::Regular,
            false,
        );
        instantiate(&mut vm, &node, vec![Value::from(1), Value::from(2), Value::from(3)]);
        let rest = lookup(&vm, "rest");
        assert_eq!(vm.array_elements(&rest).unwrap(), vec![Value::from(2), Value::from(3)]);
    }

    #[test]
    fn test_default_sees_earlier_parameter() {
        let mut vm = VM::default();
        let node = function_with(
            "f",
            vec![param("a"), param_default("b", add_(ident("a"), num(1.0)))],
            vec![],
            FunctionKind::Regular,
            false,
        );
        instantiate(&mut vm, &node, vec![Value::from(4)]);
        assert_eq!(lookup(&vm, "b"), Value::from(5));
        // Parameter expressions give the parameters their own scope below the body's
        let var_env = vm.running_context().variable_environment;
        let parameter_env = vm.heap.environment(var_env).outer.unwrap();
        assert!(vm.heap.environment(parameter_env).bindings.contains_key("b"));
        assert!(!vm.heap.environment(var_env).bindings.contains_key("b"));
    }

    #[test]
    fn test_mapped_arguments_aliases_parameters() {
        let mut vm = VM::default();
        let node = function("f", &["a"], vec![ret(ident("arguments"))]);
        instantiate(&mut vm, &node, vec![Value::from(1)]);
        let arguments = lookup(&vm, "arguments").as_object().unwrap();

        let reference = vm.resolve_reference("a", None);
        vm.put_value(&reference, Value::from(9)).unwrap();
        assert_eq!(vm.get(arguments, &PropertyKey::from(0usize)).unwrap(), Value::from(9));

        vm.set(arguments, PropertyKey::from(0usize), Value::from(3), false).unwrap();
        assert_eq!(lookup(&vm, "a"), Value::from(3));
    }

    #[test]
    fn test_strict_arguments_are_a_snapshot() {
        let mut vm = VM::default();
        let node = strict_function("f", &["a"], vec![ret(ident("arguments"))]);
        instantiate(&mut vm, &node, vec![Value::from(1)]);
        let arguments = lookup(&vm, "arguments").as_object().unwrap();

        let reference = vm.resolve_reference("a", None);
        vm.put_value(&reference, Value::from(9)).unwrap();
        assert_eq!(vm.get(arguments, &PropertyKey::from(0usize)).unwrap(), Value::from(1));
        assert!(vm
            .get(arguments, &PropertyKey::from("callee"))
            .unwrap_err()
            .is_type_error());
    }

    #[test]
    fn test_no_arguments_object_when_unreferenced_or_arrow() {
        let mut vm = VM::default();
        let node = function("f", &["a"], vec![ret(ident("a"))]);
        instantiate(&mut vm, &node, vec![]);
        let env = vm.running_context().lexical_environment;
        assert!(!vm.heap.environment(env).bindings.contains_key("arguments"));
    }

    #[test]
    fn test_parameter_named_arguments_suppresses_object() {
        let mut vm = VM::default();
        let node = function("f", &["arguments"], vec![ret(ident("arguments"))]);
        instantiate(&mut vm, &node, vec![Value::from(7)]);
        assert_eq!(lookup(&vm, "arguments"), Value::from(7));
    }

    #[test]
    fn test_function_declarations_hoisted_last_wins() {
        let mut vm = VM::default();
        let node = function(
            "f",
            &[],
            vec![
                function_declaration("g", &[], vec![ret(num(1.0))]),
                function_declaration("g", &[], vec![ret(num(2.0))]),
            ],
        );
        instantiate(&mut vm, &node, vec![]);
        let g = lookup(&vm, "g");
        assert_eq!(vm.call(&g, Value::Undefined, vec![]).unwrap(), Value::from(2));
    }

    #[test]
    fn test_lexical_environment_elided_without_lexical_declarations() {
        let mut vm = VM::default();
        let node = function("f", &[], vec![var("x", None)]);
        instantiate(&mut vm, &node, vec![]);
        let context = vm.running_context();
        assert_eq!(context.lexical_environment, context.variable_environment);

        let mut vm = VM::default();
        let node = function("f", &[], vec![let_("y", None)]);
        instantiate(&mut vm, &node, vec![]);
        let context = vm.running_context();
        assert_ne!(context.lexical_environment, context.variable_environment);
        assert!(vm
            .heap
            .get_binding_value(context.lexical_environment, "y")
            .unwrap_err()
            .is_reference_error());
    }

    #[test]
    fn test_var_shadowing_parameter_copies_value_with_parameter_expressions() {
        let mut vm = VM::default();
        let node = function_with(
            "f",
            vec![param("a"), param_default("b", num(0.0))],
            vec![var("a", None)],
            FunctionKind::Regular,
            false,
        );
        instantiate(&mut vm, &node, vec![Value::from(5)]);
        let var_env = vm.running_context().variable_environment;
        assert_eq!(vm.heap.get_binding_value(var_env, "a").unwrap(), Value::from(5));
    }

    #[test]
    fn test_annex_b_candidates_predeclared() {
        let mut vm = VM::default();
        let node = function(
            "f",
            &[],
            vec![block(vec![function_declaration("inner", &[], vec![])])],
        );
        instantiate(&mut vm, &node, vec![]);
        assert_eq!(lookup(&vm, "inner"), Value::Undefined);
        assert_eq!(vm.running_context().annex_b_function_names, vec!["inner"]);
    }

    #[test]
    fn test_pattern_parameter_binding() {
        let mut vm = VM::default();
        let node = function_with(
            "f",
            vec![pattern_param(array_pattern(&["x", "y"]))],
            vec![],
            FunctionKind::Regular,
            false,
        );
        let array = vm.create_array(vec![Value::from(1), Value::from(2)]);
        instantiate(&mut vm, &node, vec![Value::Object(array)]);
        assert_eq!(lookup(&vm, "x"), Value::from(1));
        assert_eq!(lookup(&vm, "y"), Value::from(2));
    }

    #[test]
    fn test_object_pattern_on_undefined_is_type_error() {
        let mut vm = VM::default();
        let err = vm
            .binding_initialization(
                &object_pattern(&["a"]),
                Value::Undefined,
                None,
                DefaultEvaluation::Evaluate,
            )
            .unwrap_err();
        assert!(err.is_type_error());
    }
}
