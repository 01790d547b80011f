//! Time-travel state capture.
//!
//! A [`VmState`] is a deep copy of the globals table and the object heap.
//! [`StateLog`] keeps a bounded FIFO ring of them (oldest evicted past
//! capacity) plus one named checkpoint slot. Restoration order:
//!
//! - `step_back` pops and restores the *newest* log entry;
//! - `replay(steps)` restores the checkpoint, then reapplies up to `steps`
//!   log entries oldest-first, without consuming them.
//!
//! Deep copies mean a snapshot never aliases the live world: mutating the
//! world after capture cannot retroactively change a snapshot.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::memory::heap::Heap;
use crate::memory::value::Value;

/// A captured `(globals, heap)` pair.
#[derive(Debug, Clone)]
pub struct VmState {
    pub globals: FxHashMap<String, Value>,
    pub heap: Heap,
}

impl VmState {
    pub fn capture(globals: &FxHashMap<String, Value>, heap: &Heap) -> Self {
        VmState {
            globals: globals.clone(),
            heap: heap.clone(),
        }
    }
}

/// Bounded FIFO snapshot ring plus a single named checkpoint slot.
#[derive(Debug, Default)]
pub struct StateLog {
    entries: VecDeque<VmState>,
    capacity: usize,
    checkpoint: Option<VmState>,
}

impl StateLog {
    pub fn new(capacity: usize) -> Self {
        StateLog {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            checkpoint: None,
        }
    }

    /// Appends a snapshot, evicting the oldest entry once full.
    pub fn log(&mut self, state: VmState) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(state);
    }

    /// Removes and returns the most recently logged snapshot.
    pub fn pop_newest(&mut self) -> Option<VmState> {
        self.entries.pop_back()
    }

    /// Stores the named checkpoint, replacing any previous one.
    pub fn set_checkpoint(&mut self, state: VmState) {
        self.checkpoint = Some(state);
    }

    pub fn checkpoint(&self) -> Option<&VmState> {
        self.checkpoint.as_ref()
    }

    /// Log entries oldest-first, for replay.
    pub fn entries(&self) -> impl Iterator<Item = &VmState> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops all entries and the checkpoint; used during shutdown.
    pub fn drain(&mut self) {
        self.entries.clear();
        self.checkpoint = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(global: &str, n: i32) -> VmState {
        let mut globals = FxHashMap::default();
        globals.insert(global.to_string(), Value::Int(n));
        VmState {
            globals,
            heap: Heap::new(),
        }
    }

    #[test]
    fn ring_evicts_oldest_at_capacity() {
        let mut log = StateLog::new(3);
        for i in 0..5 {
            log.log(state_with("x", i));
        }
        assert_eq!(log.len(), 3);
        // Oldest surviving entry is i == 2.
        let first = log.entries().next().unwrap();
        assert_eq!(first.globals.get("x"), Some(&Value::Int(2)));
    }

    #[test]
    fn pop_newest_is_lifo() {
        let mut log = StateLog::new(10);
        log.log(state_with("x", 1));
        log.log(state_with("x", 2));

        let popped = log.pop_newest().unwrap();
        assert_eq!(popped.globals.get("x"), Some(&Value::Int(2)));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn checkpoint_slot_is_single_and_replaceable() {
        let mut log = StateLog::new(10);
        assert!(log.checkpoint().is_none());
        log.set_checkpoint(state_with("x", 1));
        log.set_checkpoint(state_with("x", 2));
        assert_eq!(
            log.checkpoint().unwrap().globals.get("x"),
            Some(&Value::Int(2))
        );
    }

    #[test]
    fn snapshots_do_not_alias_the_source() {
        let mut globals = FxHashMap::default();
        globals.insert("g".to_string(), Value::Str("before".to_string()));
        let heap = Heap::new();

        let state = VmState::capture(&globals, &heap);
        globals.insert("g".to_string(), Value::Str("after".to_string()));

        assert_eq!(
            state.globals.get("g"),
            Some(&Value::Str("before".to_string()))
        );
    }
}
