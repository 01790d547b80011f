//! The managed object heap.
//!
//! Objects are keyed by monotonically increasing 64-bit ids; payloads are
//! ordinary [`Value`]s and are opaque to the heap itself. Allocation never
//! fails — budget enforcement is the caller's job via the advisory
//! memory gate — and objects are destroyed only by a sweep.

use rustc_hash::{FxHashMap, FxHashSet};

use super::value::Value;

/// Id-keyed object store. Cloneable so snapshots can deep-copy it wholesale.
#[derive(Debug, Clone, Default)]
pub struct Heap {
    objects: FxHashMap<u64, Value>,
}

impl Heap {
    pub fn new() -> Self {
        Heap::default()
    }

    /// Stores `value` under `id`, replacing any previous payload.
    pub fn insert(&mut self, id: u64, value: Value) {
        self.objects.insert(id, value);
    }

    pub fn get(&self, id: u64) -> Option<&Value> {
        self.objects.get(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.objects.contains_key(&id)
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Iterates over `(id, payload)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&u64, &Value)> {
        self.objects.iter()
    }

    /// Deletes every object whose id is not in `reachable`.
    ///
    /// Returns the number of objects freed.
    pub fn sweep(&mut self, reachable: &FxHashSet<u64>) -> usize {
        let before = self.objects.len();
        self.objects.retain(|id, _| reachable.contains(id));
        before - self.objects.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_keeps_only_reachable() {
        let mut heap = Heap::new();
        heap.insert(1, Value::Int(10));
        heap.insert(2, Value::Int(20));
        heap.insert(3, Value::Int(30));

        let mut reachable = FxHashSet::default();
        reachable.insert(2);

        let freed = heap.sweep(&reachable);
        assert_eq!(freed, 2);
        assert_eq!(heap.len(), 1);
        assert!(heap.contains(2));
        assert!(!heap.contains(1));
    }

    #[test]
    fn sweep_with_empty_roots_clears_heap() {
        let mut heap = Heap::new();
        heap.insert(5, Value::Str("orphan".to_string()));
        let freed = heap.sweep(&FxHashSet::default());
        assert_eq!(freed, 1);
        assert!(heap.is_empty());
    }
}
