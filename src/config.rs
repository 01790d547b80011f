//! Runtime configuration and fixed policy constants.
//!
//! Heap budgets are expressed in object counts, not bytes: occupancy is the
//! number of live heap objects, and the pressure gate compares that count
//! against `max_heap_size`. Only the off-heap arena is byte-accounted.

use std::time::Duration;

/// Fraction of `max_heap_size` past which the memory gate fails.
pub const HEAP_PRESSURE_RATIO: f64 = 0.9;

/// Fixed in-flight budget the deadline-compliance gate checks against.
pub const DEADLINE_COMPLIANCE_MS: u64 = 1000;

/// Snapshot ring capacity for the time-travel log.
pub const STATE_LOG_CAPACITY: usize = 100;

/// How often the background collector wakes to check occupancy.
pub const DEFAULT_GC_PERIOD: Duration = Duration::from_millis(100);

/// Synthetic nesting depth past which the verifier flags overflow risk.
pub const DEFAULT_VERIFIER_MAX_DEPTH: u32 = 32;

/// Tunable limits for an execution environment.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Maximum live heap objects before the pressure gate trips.
    pub max_heap_size: usize,
    /// Live-object count above which a periodic collection actually runs.
    pub gc_threshold: usize,
    /// Off-heap arena budget, in bytes.
    pub max_off_heap_size: usize,
    /// Background collector wake period.
    pub gc_period: Duration,
    /// Capacity of the time-travel snapshot ring.
    pub state_log_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            max_heap_size: 4096,
            gc_threshold: 2048,
            max_off_heap_size: 1024 * 1024,
            gc_period: DEFAULT_GC_PERIOD,
            state_log_capacity: STATE_LOG_CAPACITY,
        }
    }
}
