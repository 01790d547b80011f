//! Mark-sweep collection.
//!
//! Roots are the globals table, every registered method's locals and
//! parameters, and every registered class's field values. Marking chases
//! refs transitively through heap payloads (a list on the heap can hold
//! refs to further objects); sweeping drops everything unmarked.
//!
//! The background collector wakes on a fixed period and only runs a cycle
//! once heap occupancy passes the configured threshold. Both the periodic
//! wait and any in-flight sleep are cut short by shutdown.

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::interpreter::env::{Shared, World};

/// Runs one mark-sweep cycle and returns the number of objects freed.
/// Callers hold the world lock, so no mutator can run mid-cycle.
pub(crate) fn collect(world: &mut World) -> usize {
    let mut roots = FxHashSet::default();
    for value in world.globals.values() {
        value.collect_refs(&mut roots);
    }
    for method in world.methods.values() {
        method.collect_roots(&mut roots);
    }
    for class in world.classes.values() {
        class.collect_roots(&mut roots);
    }

    // Transitive closure over heap payloads.
    let mut reachable = FxHashSet::default();
    let mut worklist: Vec<u64> = roots.into_iter().collect();
    while let Some(id) = worklist.pop() {
        if !reachable.insert(id) {
            continue;
        }
        if let Some(payload) = world.heap.get(id) {
            let mut inner = FxHashSet::default();
            payload.collect_refs(&mut inner);
            for next in inner {
                if !reachable.contains(&next) {
                    worklist.push(next);
                }
            }
        }
    }

    let freed = world.heap.sweep(&reachable);
    if freed > 0 {
        debug!(freed, live = world.heap.len(), "collection cycle complete");
    } else {
        trace!(live = world.heap.len(), "collection cycle freed nothing");
    }
    freed
}

/// Body of the background collector thread. Returns on shutdown.
pub(crate) fn collector_loop(shared: &Shared) {
    loop {
        {
            let mut stopped = shared.stop.lock();
            if *stopped {
                return;
            }
            shared
                .stop_signal
                .wait_for(&mut stopped, shared.config.gc_period);
            if *stopped {
                return;
            }
        }

        let mut world = shared.world.lock();
        if world.heap.len() > shared.config.gc_threshold {
            collect(&mut world);
        }
    }
}
