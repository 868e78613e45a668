//! Garbage collector for the invocation engine
//!
//! Objects, environments and symbols live in slot arenas owned by a [`Heap`]
//! and are addressed by copyable ids. Environments reference their parents,
//! closures reference environments, and environments hold closures created
//! within them, so ownership is cyclic; reclamation is a mark-and-sweep over
//! those ids rather than reference counting.
//!
//! ## Design
//!
//! - **Mark phase**: every heap record reports its strong references to a
//!   [`Visitor`] through the [`Trace`] trait, starting from the roots the
//!   caller supplies (realm, execution contexts, host values)
//! - **Sweep phase**: unmarked slots are emptied and their indices reused
//!
//! Collection only happens when requested, never in the middle of evaluation,
//! so ids held on the Rust stack during a call are always valid.

use crate::runtime::{Environment, Object, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, trace};

macro_rules! heap_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Slot index in its arena
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

heap_id!(
    /// Handle to a heap object
    ObjectId,
    "Object"
);
heap_id!(
    /// Handle to an environment record
    EnvironmentId,
    "Environment"
);
heap_id!(
    /// Handle to a symbol
    SymbolId,
    "Symbol"
);

/// GC configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GcConfig {
    /// Allocations after which [`Heap::should_collect`] reports true
    pub allocation_threshold: usize,
    /// Log every freed slot at `trace` level
    pub verbose: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            allocation_threshold: 1000,
            verbose: false,
        }
    }
}

/// GC statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Total slots allocated
    pub total_allocations: usize,
    /// Live objects after the last collection
    pub live_objects: usize,
    /// Live environments after the last collection
    pub live_environments: usize,
    /// Slots freed in last collection
    pub last_freed: usize,
    /// Total slots freed
    pub total_freed: usize,
    /// Number of collections
    pub collections: u64,
    /// Total time spent in GC (microseconds)
    pub total_gc_time_us: u64,
    /// Maximum pause time (microseconds)
    pub max_pause_us: u64,
}

/// A heap record (or root holder) that owns strong references
pub trait Trace {
    /// Report every strong reference to the visitor
    fn trace(&self, visitor: &mut Visitor);
}

/// Collects references reported during marking
#[derive(Debug, Default)]
pub struct Visitor {
    objects: Vec<ObjectId>,
    environments: Vec<EnvironmentId>,
    symbols: Vec<SymbolId>,
}

impl Visitor {
    /// Visit an object
    pub fn visit_object(&mut self, id: ObjectId) {
        self.objects.push(id);
    }

    /// Visit an environment
    pub fn visit_environment(&mut self, id: EnvironmentId) {
        self.environments.push(id);
    }

    /// Visit a symbol
    pub fn visit_symbol(&mut self, id: SymbolId) {
        self.symbols.push(id);
    }

    /// Visit whatever a value references
    pub fn visit_value(&mut self, value: &Value) {
        value.trace(self);
    }

    /// Visit every value of a slice
    pub fn visit_values(&mut self, values: &[Value]) {
        for value in values {
            value.trace(self);
        }
    }

    fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.environments.is_empty() && self.symbols.is_empty()
    }
}

impl Trace for Value {
    fn trace(&self, visitor: &mut Visitor) {
        match self {
            Value::Object(id) => visitor.visit_object(*id),
            Value::Symbol(id) => visitor.visit_symbol(*id),
            _ => {}
        }
    }
}

/// A symbol's heap record
#[derive(Debug, Clone)]
pub struct SymbolRecord {
    /// `Symbol(description)`
    pub description: Option<String>,
}

/// Slot arena with a free list
struct Arena<T> {
    slots: Vec<Option<T>>,
    free: Vec<u32>,
}

impl<T> Arena<T> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn insert(&mut self, value: T) -> u32 {
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(value);
                index
            }
            None => {
                self.slots.push(Some(value));
                (self.slots.len() - 1) as u32
            }
        }
    }

    fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Empty every occupied slot not marked; returns the number freed
    fn sweep(&mut self, marked: &[bool], verbose: bool, kind: &str) -> usize {
        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_some() && !marked[index] {
                *slot = None;
                self.free.push(index as u32);
                freed += 1;
                if verbose {
                    trace!(kind, index, "freed");
                }
            }
        }
        freed
    }
}

/// Mark-and-sweep heap of objects, environments and symbols
pub struct Heap {
    config: GcConfig,
    stats: GcStats,
    objects: Arena<Object>,
    environments: Arena<Environment>,
    symbols: Arena<SymbolRecord>,
    allocations_since_gc: usize,
}

impl Heap {
    /// Create an empty heap
    pub fn new(config: GcConfig) -> Self {
        Self {
            config,
            stats: GcStats::default(),
            objects: Arena::new(),
            environments: Arena::new(),
            symbols: Arena::new(),
            allocations_since_gc: 0,
        }
    }

    fn record_allocation(&mut self) {
        self.stats.total_allocations += 1;
        self.allocations_since_gc += 1;
    }

    /// Allocate an object
    pub fn allocate(&mut self, object: Object) -> ObjectId {
        self.record_allocation();
        ObjectId(self.objects.insert(object))
    }

    /// Allocate an environment record
    pub fn allocate_environment(&mut self, environment: Environment) -> EnvironmentId {
        self.record_allocation();
        EnvironmentId(self.environments.insert(environment))
    }

    /// Allocate a symbol
    pub fn allocate_symbol(&mut self, description: Option<String>) -> SymbolId {
        self.record_allocation();
        SymbolId(self.symbols.insert(SymbolRecord { description }))
    }

    /// Borrow an object
    ///
    /// # Panics
    /// If the id refers to a collected slot
    pub fn get(&self, id: ObjectId) -> &Object {
        match self.objects.get(id.index()) {
            Some(object) => object,
            None => panic!("use of collected {:?}", id),
        }
    }

    /// Mutably borrow an object
    pub fn get_mut(&mut self, id: ObjectId) -> &mut Object {
        match self.objects.get_mut(id.index()) {
            Some(object) => object,
            None => panic!("use of collected {:?}", id),
        }
    }

    /// Borrow an environment
    pub fn environment(&self, id: EnvironmentId) -> &Environment {
        match self.environments.get(id.index()) {
            Some(environment) => environment,
            None => panic!("use of collected {:?}", id),
        }
    }

    /// Mutably borrow an environment
    pub fn environment_mut(&mut self, id: EnvironmentId) -> &mut Environment {
        match self.environments.get_mut(id.index()) {
            Some(environment) => environment,
            None => panic!("use of collected {:?}", id),
        }
    }

    /// A symbol's description
    pub fn symbol_description(&self, id: SymbolId) -> Option<&str> {
        self.symbols
            .get(id.index())
            .and_then(|symbol| symbol.description.as_deref())
    }

    /// Whether an object slot is still occupied
    pub fn is_live(&self, id: ObjectId) -> bool {
        self.objects.get(id.index()).is_some()
    }

    /// Number of occupied object slots
    pub fn live_objects(&self) -> usize {
        self.objects.live()
    }

    /// Number of occupied environment slots
    pub fn live_environments(&self) -> usize {
        self.environments.live()
    }

    /// Get GC statistics
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    /// Check if collection is advisable based on allocation count
    pub fn should_collect(&self) -> bool {
        self.allocations_since_gc >= self.config.allocation_threshold
    }

    /// Perform a garbage collection cycle
    ///
    /// `roots` reports every root reference to the visitor it is handed.
    pub fn collect(&mut self, roots: impl FnOnce(&mut Visitor)) {
        let start = Instant::now();

        let mut marked_objects = vec![false; self.objects.slots.len()];
        let mut marked_environments = vec![false; self.environments.slots.len()];
        let mut marked_symbols = vec![false; self.symbols.slots.len()];

        let mut worklist = Visitor::default();
        roots(&mut worklist);

        while !worklist.is_empty() {
            let mut next = Visitor::default();
            for id in worklist.objects.drain(..) {
                if let Some(mark) = marked_objects.get_mut(id.index()) {
                    if !*mark {
                        *mark = true;
                        if let Some(object) = self.objects.get(id.index()) {
                            object.trace(&mut next);
                        }
                    }
                }
            }
            for id in worklist.environments.drain(..) {
                if let Some(mark) = marked_environments.get_mut(id.index()) {
                    if !*mark {
                        *mark = true;
                        if let Some(environment) = self.environments.get(id.index()) {
                            environment.trace(&mut next);
                        }
                    }
                }
            }
            for id in worklist.symbols.drain(..) {
                if let Some(mark) = marked_symbols.get_mut(id.index()) {
                    *mark = true;
                }
            }
            worklist = next;
        }

        let verbose = self.config.verbose;
        let freed = self.objects.sweep(&marked_objects, verbose, "object")
            + self.environments.sweep(&marked_environments, verbose, "environment")
            + self.symbols.sweep(&marked_symbols, verbose, "symbol");

        self.stats.last_freed = freed;
        self.stats.total_freed += freed;
        self.stats.live_objects = self.objects.live();
        self.stats.live_environments = self.environments.live();
        self.stats.collections += 1;
        self.allocations_since_gc = 0;

        let elapsed = start.elapsed().as_micros() as u64;
        self.stats.total_gc_time_us += elapsed;
        self.stats.max_pause_us = self.stats.max_pause_us.max(elapsed);

        debug!(
            freed,
            live_objects = self.stats.live_objects,
            live_environments = self.stats.live_environments,
            elapsed_us = elapsed,
            "garbage collection complete"
        );
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(GcConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Environment, Object, PropertyKey};

    #[test]
    fn test_heap_creation() {
        let heap = Heap::default();
        assert_eq!(heap.stats().total_allocations, 0);
        assert_eq!(heap.stats().collections, 0);
        assert_eq!(heap.live_objects(), 0);
    }

    #[test]
    fn test_unreachable_objects_are_freed() {
        let mut heap = Heap::default();
        let root = heap.allocate(Object::ordinary(None));
        let child = heap.allocate(Object::ordinary(None));
        let orphan = heap.allocate(Object::ordinary(None));
        heap.get_mut(root)
            .define_data_property(PropertyKey::from("child"), Value::Object(child));

        heap.collect(|visitor| visitor.visit_object(root));

        assert!(heap.is_live(root));
        assert!(heap.is_live(child));
        assert!(!heap.is_live(orphan));
        assert_eq!(heap.stats().last_freed, 1);
        assert_eq!(heap.stats().collections, 1);
    }

    #[test]
    fn test_cycles_are_collected() {
        let mut heap = Heap::default();
        let a = heap.allocate(Object::ordinary(None));
        let b = heap.allocate(Object::ordinary(Some(a)));
        heap.get_mut(a)
            .define_data_property(PropertyKey::from("b"), Value::Object(b));

        heap.collect(|_| {});

        assert!(!heap.is_live(a));
        assert!(!heap.is_live(b));
        assert_eq!(heap.live_objects(), 0);
    }

    #[test]
    fn test_environment_chain_is_traced() {
        let mut heap = Heap::default();
        let outer = heap.allocate_environment(Environment::declarative(None));
        let inner = heap.allocate_environment(Environment::declarative(Some(outer)));
        let dropped = heap.allocate_environment(Environment::declarative(None));

        heap.collect(|visitor| visitor.visit_environment(inner));

        assert_eq!(heap.live_environments(), 2);
        let _ = heap.environment(outer);
        let reused = heap.allocate_environment(Environment::declarative(None));
        assert_eq!(reused, dropped);
    }

    #[test]
    fn test_should_collect() {
        let mut heap = Heap::new(GcConfig {
            allocation_threshold: 3,
            verbose: false,
        });
        heap.allocate(Object::ordinary(None));
        heap.allocate(Object::ordinary(None));
        assert!(!heap.should_collect());
        heap.allocate_symbol(None);
        assert!(heap.should_collect());
        heap.collect(|_| {});
        assert!(!heap.should_collect());
    }

    #[test]
    fn test_symbol_description() {
        let mut heap = Heap::default();
        let symbol = heap.allocate_symbol(Some("tag".to_string()));
        assert_eq!(heap.symbol_description(symbol), Some("tag"));
        heap.collect(|visitor| visitor.visit_symbol(symbol));
        assert_eq!(heap.symbol_description(symbol), Some("tag"));
    }
}
