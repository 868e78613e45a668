//! Realm: intrinsic prototypes, the global object and the global environment

use super::environment::Environment;
use super::generator;
use super::object::{BuiltinFn, NativeBehaviour, NativeFunction, Object, ObjectKind, Property};
use super::value::{PropertyKey, Value};
use super::VM;
use crate::error::Result;
use crate::gc::{EnvironmentId, Heap, ObjectId, Trace, Visitor};

/// Well-known intrinsic objects
#[derive(Debug, Clone, Copy)]
pub struct Intrinsics {
    pub object_prototype: ObjectId,
    pub function_prototype: ObjectId,
    pub generator_function_prototype: ObjectId,
    pub async_function_prototype: ObjectId,
    pub generator_prototype: ObjectId,
    pub array_prototype: ObjectId,
    pub error_prototype: ObjectId,
    pub promise_prototype: ObjectId,
    pub string_prototype: ObjectId,
    pub number_prototype: ObjectId,
    pub boolean_prototype: ObjectId,
    pub symbol_prototype: ObjectId,
}

impl Intrinsics {
    fn all(&self) -> [ObjectId; 12] {
        [
            self.object_prototype,
            self.function_prototype,
            self.generator_function_prototype,
            self.async_function_prototype,
            self.generator_prototype,
            self.array_prototype,
            self.error_prototype,
            self.promise_prototype,
            self.string_prototype,
            self.number_prototype,
            self.boolean_prototype,
            self.symbol_prototype,
        ]
    }
}

/// The single realm a [`VM`] evaluates in
#[derive(Debug, Clone, Copy)]
pub struct Realm {
    pub intrinsics: Intrinsics,
    /// Also the global `this`
    pub global_object: ObjectId,
    pub global_environment: EnvironmentId,
}

impl Realm {
    /// Allocate the intrinsics and the global scope
    pub fn create(heap: &mut Heap) -> Self {
        let object_prototype = heap.allocate(Object::ordinary(None));
        let derived = |heap: &mut Heap| heap.allocate(Object::ordinary(Some(object_prototype)));
        let function_prototype = derived(heap);
        let generator_prototype = derived(heap);
        let array_prototype = derived(heap);
        let error_prototype = derived(heap);
        let promise_prototype = derived(heap);
        let string_prototype = derived(heap);
        let number_prototype = derived(heap);
        let boolean_prototype = derived(heap);
        let symbol_prototype = derived(heap);
        let generator_function_prototype = heap.allocate(Object::ordinary(Some(function_prototype)));
        let async_function_prototype = heap.allocate(Object::ordinary(Some(function_prototype)));

        let intrinsics = Intrinsics {
            object_prototype,
            function_prototype,
            generator_function_prototype,
            async_function_prototype,
            generator_prototype,
            array_prototype,
            error_prototype,
            promise_prototype,
            string_prototype,
            number_prototype,
            boolean_prototype,
            symbol_prototype,
        };

        heap.get_mut(generator_function_prototype).define_property(
            PropertyKey::from("prototype"),
            Property::with_attributes(Value::Object(generator_prototype), false, false, true),
        );
        for (name, behaviour) in [
            ("next", generator::generator_prototype_next as BuiltinFn),
            ("return", generator::generator_prototype_return as BuiltinFn),
            ("throw", generator::generator_prototype_throw as BuiltinFn),
        ] {
            let method = native_function(heap, &intrinsics, name, behaviour);
            heap.get_mut(generator_prototype)
                .define_property(PropertyKey::from(name), Property::hidden(Value::Object(method)));
        }

        let global_object = heap.allocate(Object::ordinary(Some(object_prototype)));
        let global_environment = heap.allocate_environment(Environment::global(global_object));

        let symbol = native_function(heap, &intrinsics, "Symbol", symbol_constructor);
        let global = heap.get_mut(global_object);
        global.define_property(
            PropertyKey::from("globalThis"),
            Property::hidden(Value::Object(global_object)),
        );
        global.define_property(PropertyKey::from("Symbol"), Property::hidden(Value::Object(symbol)));
        global.define_property(
            PropertyKey::from("undefined"),
            Property::with_attributes(Value::Undefined, false, false, false),
        );

        Self {
            intrinsics,
            global_object,
            global_environment,
        }
    }
}

/// Allocate a builtin with no captures
pub(crate) fn native_function(
    heap: &mut Heap,
    intrinsics: &Intrinsics,
    name: &str,
    behaviour: BuiltinFn,
) -> ObjectId {
    heap.allocate(Object::with_kind(
        ObjectKind::NativeFunction(NativeFunction {
            name: name.to_string(),
            behaviour: NativeBehaviour::Builtin(behaviour),
            captures: Vec::new(),
        }),
        Some(intrinsics.function_prototype),
    ))
}

fn symbol_constructor(vm: &mut VM, _this: &Value, arguments: &[Value], _captures: &[Value]) -> Result<Value> {
    let description = match arguments.first() {
        None | Some(Value::Undefined) => None,
        Some(value) => Some(vm.to_string_value(value)?),
    };
    Ok(Value::Symbol(vm.heap.allocate_symbol(description)))
}

impl Trace for Realm {
    fn trace(&self, visitor: &mut Visitor) {
        for intrinsic in self.intrinsics.all() {
            visitor.visit_object(intrinsic);
        }
        visitor.visit_object(self.global_object);
        visitor.visit_environment(self.global_environment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realm_globals() {
        let mut heap = Heap::default();
        let realm = Realm::create(&mut heap);
        let global = heap.get(realm.global_object);
        assert!(global.get_own_property(&PropertyKey::from("globalThis")).is_some());
        assert!(global.get_own_property(&PropertyKey::from("Symbol")).is_some());
        assert_eq!(global.prototype, Some(realm.intrinsics.object_prototype));
    }

    #[test]
    fn test_generator_prototype_methods() {
        let mut heap = Heap::default();
        let realm = Realm::create(&mut heap);
        let proto = heap.get(realm.intrinsics.generator_prototype);
        for name in ["next", "return", "throw"] {
            let method = proto.get_own_property(&PropertyKey::from(name)).unwrap();
            assert!(!method.enumerable);
        }
    }

    #[test]
    fn test_realm_survives_collection() {
        let mut heap = Heap::default();
        let realm = Realm::create(&mut heap);
        let before = heap.live_objects();
        heap.collect(|visitor| realm.trace(visitor));
        assert_eq!(heap.live_objects(), before);
    }
}
