//! Named-type registry, assignability rules, off-heap arena, and deadline
//! registration.
//!
//! The off-heap arena replaces the raw-pointer API of a typical embedded
//! runtime with handles: every allocation records its size and a freed flag,
//! so a double free or a free of an unknown handle is an error instead of
//! undefined behavior. The arena is outside the collector's world; release
//! is the caller's responsibility.
//!
//! Dynamic class loading is permanently disabled — embedded targets run a
//! fixed program image.

use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::config::RuntimeConfig;

/// Errors raised by the type system.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("type '{name}' already exists")]
    DuplicateType { name: String },

    #[error("allocation of {requested} bytes exceeds off-heap budget of {budget} bytes")]
    AllocationTooLarge { requested: usize, budget: usize },

    #[error("dynamic class loading is forbidden: '{name}'")]
    DynamicLoadForbidden { name: String },

    #[error("invalid deadline: {ms}ms")]
    InvalidDeadline { ms: i64 },

    #[error("invalid off-heap handle #{handle}")]
    InvalidHandle { handle: u64 },
}

/// The shape of a registered type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    /// Fixed-size scalar; compatible only with the identically named primitive.
    Primitive { size: usize },
    /// Heap reference; compatible with the same name or the universal `Object`.
    Reference,
    /// No value; compatible only with void.
    Void,
}

/// Handle to a live off-heap allocation. Carries the id only; size and the
/// freed flag stay inside the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OffHeapHandle(u64);

impl OffHeapHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone)]
struct OffHeapBlock {
    size: usize,
    freed: bool,
}

/// Byte arena with manual release and handle-based ownership tracking.
#[derive(Debug, Default)]
pub struct OffHeapArena {
    max_size: usize,
    used: usize,
    next_handle: u64,
    blocks: FxHashMap<u64, OffHeapBlock>,
}

impl OffHeapArena {
    pub fn new(max_size: usize) -> Self {
        OffHeapArena {
            max_size,
            used: 0,
            next_handle: 1,
            blocks: FxHashMap::default(),
        }
    }

    /// Reserves `size` bytes. Fails when the request alone or the resulting
    /// occupancy would exceed the configured maximum.
    pub fn alloc(&mut self, size: usize) -> Result<OffHeapHandle, TypeError> {
        if size > self.max_size || self.used + size > self.max_size {
            return Err(TypeError::AllocationTooLarge {
                requested: size,
                budget: self.max_size,
            });
        }

        let handle = OffHeapHandle(self.next_handle);
        self.next_handle += 1;
        self.blocks.insert(handle.0, OffHeapBlock { size, freed: false });
        self.used += size;
        Ok(handle)
    }

    /// Releases a previous allocation. Unknown handles and double frees are
    /// reported, never silently accepted.
    pub fn free(&mut self, handle: OffHeapHandle) -> Result<(), TypeError> {
        match self.blocks.get_mut(&handle.0) {
            Some(block) if !block.freed => {
                block.freed = true;
                self.used -= block.size;
                Ok(())
            }
            _ => Err(TypeError::InvalidHandle { handle: handle.0 }),
        }
    }

    /// Bytes currently allocated and not freed.
    pub fn used(&self) -> usize {
        self.used
    }

    pub fn size_of(&self, handle: OffHeapHandle) -> Option<usize> {
        self.blocks.get(&handle.0).map(|b| b.size)
    }
}

/// Per-method deadline bookkeeping: required budget plus observed history.
#[derive(Debug, Clone)]
pub struct DeadlineInfo {
    required_ms: u64,
    executions: Vec<Duration>,
}

impl DeadlineInfo {
    fn new(required_ms: u64) -> Self {
        DeadlineInfo {
            required_ms,
            executions: Vec::new(),
        }
    }

    pub fn required_ms(&self) -> u64 {
        self.required_ms
    }

    pub fn record_execution(&mut self, elapsed: Duration) {
        self.executions.push(elapsed);
    }

    pub fn executions(&self) -> &[Duration] {
        &self.executions
    }
}

/// Registry of named types plus the off-heap arena and deadline table.
#[derive(Debug)]
pub struct TypeSystem {
    types: FxHashMap<String, TypeKind>,
    deadlines: FxHashMap<String, DeadlineInfo>,
    arena: OffHeapArena,
}

impl TypeSystem {
    /// Creates a type system with the built-in types pre-registered:
    /// `int(4)`, `boolean(1)`, `String`, `Object`, `void`.
    pub fn new(max_off_heap_size: usize) -> Self {
        let mut types = FxHashMap::default();
        types.insert("int".to_string(), TypeKind::Primitive { size: 4 });
        types.insert("boolean".to_string(), TypeKind::Primitive { size: 1 });
        types.insert("String".to_string(), TypeKind::Reference);
        types.insert("Object".to_string(), TypeKind::Reference);
        types.insert("void".to_string(), TypeKind::Void);

        TypeSystem {
            types,
            deadlines: FxHashMap::default(),
            arena: OffHeapArena::new(max_off_heap_size),
        }
    }

    /// Type system sized from the runtime configuration's off-heap budget.
    pub fn from_config(config: &RuntimeConfig) -> Self {
        TypeSystem::new(config.max_off_heap_size)
    }

    /// Registers a new named type. A duplicate name fails and leaves the
    /// registry untouched.
    pub fn register_type(&mut self, name: impl Into<String>, kind: TypeKind) -> Result<(), TypeError> {
        let name = name.into();
        if self.types.contains_key(&name) {
            return Err(TypeError::DuplicateType { name });
        }
        self.types.insert(name, kind);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&TypeKind> {
        self.types.get(name)
    }

    /// Whether a value of `source` may be assigned where `target` is
    /// expected. Unknown names on either side answer `false`, never error.
    pub fn check_compatibility(&self, source: &str, target: &str) -> bool {
        let (src, dst) = match (self.types.get(source), self.types.get(target)) {
            (Some(s), Some(t)) => (s, t),
            _ => return false,
        };

        match (src, dst) {
            (TypeKind::Primitive { .. }, TypeKind::Primitive { .. }) => source == target,
            (TypeKind::Reference, TypeKind::Reference) => {
                source == target || source == "Object" || target == "Object"
            }
            (TypeKind::Void, TypeKind::Void) => true,
            _ => false,
        }
    }

    /// Declares a required deadline for a method. Non-positive budgets are
    /// rejected here; the verifier reports the same condition non-fatally
    /// for already-declared methods.
    pub fn register_deadline(&mut self, method: impl Into<String>, ms: i64) -> Result<(), TypeError> {
        if ms <= 0 {
            return Err(TypeError::InvalidDeadline { ms });
        }
        self.deadlines
            .insert(method.into(), DeadlineInfo::new(ms as u64));
        Ok(())
    }

    pub fn deadline(&self, method: &str) -> Option<&DeadlineInfo> {
        self.deadlines.get(method)
    }

    /// Appends an observed execution time to the method's history.
    pub fn record_execution(&mut self, method: &str, elapsed: Duration) {
        if let Some(info) = self.deadlines.get_mut(method) {
            info.record_execution(elapsed);
        }
    }

    /// Whether the method's registered budget has elapsed since `start`.
    /// Methods without a registered deadline are never exceeded.
    pub fn is_deadline_exceeded(&self, method: &str, start: Instant) -> bool {
        match self.deadlines.get(method) {
            Some(info) => start.elapsed() > Duration::from_millis(info.required_ms),
            None => false,
        }
    }

    pub fn allocate_off_heap(&mut self, size: usize) -> Result<OffHeapHandle, TypeError> {
        self.arena.alloc(size)
    }

    pub fn free_off_heap(&mut self, handle: OffHeapHandle) -> Result<(), TypeError> {
        self.arena.free(handle)
    }

    pub fn off_heap_used(&self) -> usize {
        self.arena.used()
    }

    /// Always fails: the runtime ships with a fixed program image.
    pub fn load_class_dynamically(&self, name: &str) -> Result<(), TypeError> {
        Err(TypeError::DynamicLoadForbidden {
            name: name.to_string(),
        })
    }
}
