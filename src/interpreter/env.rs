//! The execution environment.
//!
//! Owns the global table, the method and class registries, the object heap,
//! and the time-travel state log. A background collector thread runs for the
//! life of the environment; `shutdown` (also run on drop) stops it and
//! drains the checkpoint log.
//!
//! # Shared-state discipline
//!
//! Everything the collector scans lives in one [`World`] behind a single
//! `parking_lot::Mutex`. The evaluator, the collector, and the
//! checkpoint/restore paths all take the same lock, so a sweep can never
//! race an in-flight field or variable mutation and a snapshot can never
//! capture torn state. The foreground execution path is single-threaded;
//! only the collector runs concurrently with it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use tracing::{debug, info, trace, warn};

use crate::config::{RuntimeConfig, DEADLINE_COMPLIANCE_MS, HEAP_PRESSURE_RATIO};
use crate::interpreter::errors::RuntimeFault;
use crate::interpreter::eval::Evaluator;
use crate::interpreter::gc;
use crate::memory::heap::Heap;
use crate::memory::value::Value;
use crate::parser::ast::{ClassDef, MethodBody, MethodDef};
use crate::snapshot::{StateLog, VmState};

/// Every structure shared between the foreground path and the collector.
#[derive(Debug)]
pub(crate) struct World {
    pub globals: FxHashMap<String, Value>,
    pub heap: Heap,
    pub methods: FxHashMap<String, MethodDef>,
    pub classes: FxHashMap<String, ClassDef>,
    pub state_log: StateLog,
    pub method_starts: FxHashMap<String, Instant>,
    pub method_times: FxHashMap<String, Vec<Duration>>,
}

/// State shared with the collector thread.
pub(crate) struct Shared {
    pub world: Mutex<World>,
    pub next_object_id: AtomicU64,
    pub config: RuntimeConfig,
    /// Shutdown flag; the condvar wakes both the collector's period wait
    /// and any in-flight interruptible sleep.
    pub stop: Mutex<bool>,
    pub stop_signal: Condvar,
}

/// The runtime context. Construct, run, then explicitly shut down.
pub struct ExecutionEnvironment {
    shared: Arc<Shared>,
    epoch: Instant,
    collector: Option<JoinHandle<()>>,
}

impl ExecutionEnvironment {
    /// Creates an environment and starts its background collector.
    pub fn new(config: RuntimeConfig) -> Self {
        let shared = Arc::new(Shared {
            world: Mutex::new(World {
                globals: FxHashMap::default(),
                heap: Heap::new(),
                methods: FxHashMap::default(),
                classes: FxHashMap::default(),
                state_log: StateLog::new(config.state_log_capacity),
                method_starts: FxHashMap::default(),
                method_times: FxHashMap::default(),
            }),
            next_object_id: AtomicU64::new(1),
            config,
            stop: Mutex::new(false),
            stop_signal: Condvar::new(),
        });

        let collector_shared = Arc::clone(&shared);
        let collector = std::thread::Builder::new()
            .name("retrovm-gc".to_string())
            .spawn(move || gc::collector_loop(&collector_shared))
            .ok();

        info!(
            max_heap = shared.config.max_heap_size,
            gc_threshold = shared.config.gc_threshold,
            "execution environment started"
        );

        ExecutionEnvironment {
            shared,
            epoch: Instant::now(),
            collector,
        }
    }

    /// When this environment was constructed; the standard library's clock
    /// measures from here.
    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.shared.config
    }

    // --- registration ---

    pub fn register_class(&self, class: ClassDef) {
        let mut world = self.shared.world.lock();
        world.classes.insert(class.name().to_string(), class);
    }

    pub fn register_method(&self, method: MethodDef) {
        let mut world = self.shared.world.lock();
        world
            .method_times
            .entry(method.name().to_string())
            .or_default();
        world.methods.insert(method.name().to_string(), method);
    }

    /// Clones of all registered classes, for read-only consumers.
    pub fn classes(&self) -> Vec<ClassDef> {
        self.shared.world.lock().classes.values().cloned().collect()
    }

    /// Clones of all registered methods, for read-only consumers.
    pub fn methods(&self) -> Vec<MethodDef> {
        self.shared.world.lock().methods.values().cloned().collect()
    }

    pub fn get_class(&self, name: &str) -> Option<ClassDef> {
        self.shared.world.lock().classes.get(name).cloned()
    }

    // --- heap and globals ---

    /// Places `value` on the heap under the next monotonically increasing
    /// id. Never fails; the caller is expected to pre-check the budget
    /// through [`verify_memory_usage`](Self::verify_memory_usage).
    pub fn allocate_object(&self, value: Value) -> u64 {
        let id = self.shared.next_object_id.fetch_add(1, Ordering::Relaxed);
        self.shared.world.lock().heap.insert(id, value);
        id
    }

    pub fn get_object(&self, id: u64) -> Option<Value> {
        self.shared.world.lock().heap.get(id).cloned()
    }

    pub fn heap_size(&self) -> usize {
        self.shared.world.lock().heap.len()
    }

    /// Stores a global. Scalars are stored directly; non-scalar payloads are
    /// boxed through [`allocate_object`](Self::allocate_object) and the
    /// global holds the resulting ref, which unifies root marking.
    pub fn set_global_variable(&self, name: impl Into<String>, value: Value) {
        let stored = if value.is_scalar() {
            value
        } else {
            let id = self.shared.next_object_id.fetch_add(1, Ordering::Relaxed);
            let mut world = self.shared.world.lock();
            world.heap.insert(id, value);
            world.globals.insert(name.into(), Value::Ref(id));
            return;
        };
        self.shared.world.lock().globals.insert(name.into(), stored);
    }

    /// Reads a global, transparently dereferencing boxed payloads.
    pub fn get_global_variable(&self, name: &str) -> Option<Value> {
        let world = self.shared.world.lock();
        match world.globals.get(name)? {
            Value::Ref(id) => world.heap.get(*id).cloned(),
            other => Some(other.clone()),
        }
    }

    // --- execution ---

    /// Looks up and runs a registered method. The start time is recorded
    /// while the method is in flight (the deadline-compliance gate reads
    /// it), and the elapsed time lands in the method's execution history.
    pub fn execute_method(&self, name: &str, args: &[Value]) -> Result<Value, RuntimeFault> {
        let (body, locals) = {
            let mut world = self.shared.world.lock();
            let method = world
                .methods
                .get_mut(name)
                .ok_or_else(|| RuntimeFault::MethodNotFound {
                    name: name.to_string(),
                })?;

            for (index, arg) in args.iter().enumerate() {
                method.set_parameter(index, arg.clone());
            }

            let body = method.body().clone();
            let locals = method.locals().clone();
            world.method_starts.insert(name.to_string(), Instant::now());
            (body, locals)
        };

        self.run_prepared(name.to_string(), &body, locals, args)
    }

    /// Class-qualified dispatch: resolves the class, then the method on it.
    /// Timing is recorded under the `Class.method` qualified name.
    pub fn execute_class_method(
        &self,
        class_name: &str,
        method_name: &str,
        args: &[Value],
    ) -> Result<Value, RuntimeFault> {
        let qualified = format!("{}.{}", class_name, method_name);
        let (body, locals) = {
            let mut world = self.shared.world.lock();
            let class = world
                .classes
                .get_mut(class_name)
                .ok_or_else(|| RuntimeFault::ClassNotFound {
                    name: class_name.to_string(),
                })?;
            let method =
                class
                    .method_mut(method_name)
                    .ok_or_else(|| RuntimeFault::MethodNotFound {
                        name: qualified.clone(),
                    })?;

            for (index, arg) in args.iter().enumerate() {
                method.set_parameter(index, arg.clone());
            }

            let body = method.body().clone();
            let locals = method.locals().clone();
            world.method_starts.insert(qualified.clone(), Instant::now());
            (body, locals)
        };

        self.run_prepared(qualified, &body, locals, args)
    }

    /// Runs an already-resolved body and settles the timing bookkeeping
    /// under `key`, which was inserted into `method_starts` by the caller.
    fn run_prepared(
        &self,
        key: String,
        body: &MethodBody,
        locals: FxHashMap<String, Value>,
        args: &[Value],
    ) -> Result<Value, RuntimeFault> {
        let started = Instant::now();
        let result = match body {
            MethodBody::Native(native) => native(self, args),
            MethodBody::Ast(node) => Evaluator::with_locals(self, locals).eval(node),
        };

        let elapsed = started.elapsed();
        {
            let mut world = self.shared.world.lock();
            world.method_starts.remove(&key);
            world.method_times.entry(key.clone()).or_default().push(elapsed);
        }

        if result.is_err() {
            warn!(method = %key, ?elapsed, "method invocation faulted");
        }
        result
    }

    /// Observed execution times for a method, oldest first.
    pub fn method_execution_times(&self, name: &str) -> Vec<Duration> {
        self.shared
            .world
            .lock()
            .method_times
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    // --- advisory gates ---

    /// Fails once heap occupancy exceeds 90% of the configured maximum.
    /// Advisory: the core never calls this on its own.
    pub fn verify_memory_usage(&self) -> Result<(), RuntimeFault> {
        let used = self.shared.world.lock().heap.len();
        let budget = self.shared.config.max_heap_size;
        if used as f64 > budget as f64 * HEAP_PRESSURE_RATIO {
            return Err(RuntimeFault::MemoryBudgetExceeded { used, budget });
        }
        Ok(())
    }

    /// Fails once a currently running method has been in flight longer than
    /// the fixed compliance threshold. Methods not running pass trivially.
    pub fn verify_deadline_compliance(&self, name: &str) -> Result<(), RuntimeFault> {
        let start = {
            let world = self.shared.world.lock();
            world.method_starts.get(name).copied()
        };
        if let Some(start) = start {
            let elapsed_ms = start.elapsed().as_millis() as u64;
            if elapsed_ms > DEADLINE_COMPLIANCE_MS {
                warn!(method = name, elapsed_ms, "deadline compliance violated");
                return Err(RuntimeFault::DeadlineExceeded {
                    limit_ms: DEADLINE_COMPLIANCE_MS,
                    elapsed_ms,
                });
            }
        }
        Ok(())
    }

    // --- collection ---

    /// Runs a full mark-sweep cycle on the calling thread and returns the
    /// number of objects freed. The background collector does the same on
    /// its own schedule once occupancy passes the threshold.
    pub fn collect_now(&self) -> usize {
        let mut world = self.shared.world.lock();
        gc::collect(&mut world)
    }

    // --- time travel ---

    /// Appends a deep `(globals, heap)` snapshot to the FIFO log.
    pub fn log_state(&self) {
        let mut world = self.shared.world.lock();
        let state = VmState::capture(&world.globals, &world.heap);
        world.state_log.log(state);
        trace!(entries = world.state_log.len(), "state logged");
    }

    /// Captures the single named checkpoint.
    pub fn checkpoint(&self) {
        let mut world = self.shared.world.lock();
        let state = VmState::capture(&world.globals, &world.heap);
        world.state_log.set_checkpoint(state);
        debug!("checkpoint captured");
    }

    /// Pops the most recently logged snapshot and restores it. A no-op when
    /// the log is empty.
    pub fn step_back(&self) {
        let mut world = self.shared.world.lock();
        if let Some(state) = world.state_log.pop_newest() {
            world.globals = state.globals;
            world.heap = state.heap;
            debug!(remaining = world.state_log.len(), "stepped back");
        }
    }

    /// Restores the named checkpoint, then reapplies up to `steps` logged
    /// snapshots oldest-first. A no-op when no checkpoint exists.
    pub fn replay(&self, steps: usize) {
        let mut world = self.shared.world.lock();
        let target = {
            let log = &world.state_log;
            let checkpoint = match log.checkpoint() {
                Some(state) => state,
                None => return,
            };
            let mut target = checkpoint.clone();
            for entry in log.entries().take(steps) {
                target = entry.clone();
            }
            target
        };
        world.globals = target.globals;
        world.heap = target.heap;
        debug!(steps, "replayed from checkpoint");
    }

    pub fn state_log_len(&self) -> usize {
        self.shared.world.lock().state_log.len()
    }

    // --- lifecycle ---

    /// Blocks the calling thread for `ms` milliseconds, waking early if the
    /// environment shuts down. The collector thread is never blocked by
    /// callers sleeping here.
    pub fn interruptible_sleep(&self, ms: u64) {
        let mut stopped = self.shared.stop.lock();
        if !*stopped {
            self.shared
                .stop_signal
                .wait_for(&mut stopped, Duration::from_millis(ms));
        }
    }

    /// Stops the collector and drains the checkpoint log. Idempotent; also
    /// runs on drop.
    pub fn shutdown(&mut self) {
        {
            let mut stopped = self.shared.stop.lock();
            if *stopped {
                return;
            }
            *stopped = true;
        }
        self.shared.stop_signal.notify_all();

        if let Some(handle) = self.collector.take() {
            let _ = handle.join();
        }

        self.shared.world.lock().state_log.drain();
        info!("execution environment stopped");
    }
}

impl Drop for ExecutionEnvironment {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::AstNode;

    fn quiet_config() -> RuntimeConfig {
        // A large threshold keeps the background collector idle so tests
        // control collection explicitly.
        RuntimeConfig {
            max_heap_size: 100,
            gc_threshold: 10_000,
            ..RuntimeConfig::default()
        }
    }

    #[test]
    fn scalars_stay_inline_and_payloads_box() {
        let env = ExecutionEnvironment::new(quiet_config());

        env.set_global_variable("n", Value::Int(42));
        assert_eq!(env.heap_size(), 0);
        assert_eq!(env.get_global_variable("n"), Some(Value::Int(42)));

        env.set_global_variable("s", Value::Str("boxed".to_string()));
        assert_eq!(env.heap_size(), 1);
        // Reads dereference transparently.
        assert_eq!(
            env.get_global_variable("s"),
            Some(Value::Str("boxed".to_string()))
        );
    }

    #[test]
    fn object_ids_increase_monotonically() {
        let env = ExecutionEnvironment::new(quiet_config());
        let a = env.allocate_object(Value::Int(1));
        let b = env.allocate_object(Value::Int(2));
        assert!(b > a);
    }

    #[test]
    fn execute_method_records_history_and_missing_method_faults() {
        let env = ExecutionEnvironment::new(quiet_config());
        env.register_method(MethodDef::new_ast(
            "answer",
            vec![],
            "int",
            AstNode::Number(42),
        ));

        assert_eq!(env.execute_method("answer", &[]), Ok(Value::Int(42)));
        assert_eq!(env.method_execution_times("answer").len(), 1);

        assert_eq!(
            env.execute_method("ghost", &[]),
            Err(RuntimeFault::MethodNotFound {
                name: "ghost".to_string()
            })
        );
    }

    #[test]
    fn class_qualified_dispatch_resolves_class_then_method() {
        let env = ExecutionEnvironment::new(quiet_config());
        let mut class = ClassDef::new("Counter");
        class.add_method(MethodDef::new_ast("peek", vec![], "int", AstNode::Number(3)));
        env.register_class(class);

        assert_eq!(
            env.execute_class_method("Counter", "peek", &[]),
            Ok(Value::Int(3))
        );
        assert_eq!(env.method_execution_times("Counter.peek").len(), 1);

        assert_eq!(
            env.execute_class_method("Ghost", "peek", &[]),
            Err(RuntimeFault::ClassNotFound {
                name: "Ghost".to_string()
            })
        );
        assert_eq!(
            env.execute_class_method("Counter", "ghost", &[]),
            Err(RuntimeFault::MethodNotFound {
                name: "Counter.ghost".to_string()
            })
        );
    }

    #[test]
    fn memory_gate_fails_past_ninety_percent() {
        let mut config = quiet_config();
        config.max_heap_size = 10;
        let env = ExecutionEnvironment::new(config);

        for i in 0..9 {
            env.allocate_object(Value::Int(i));
        }
        // Nine of ten is exactly 90%, which does not trip the gate.
        assert!(env.verify_memory_usage().is_ok());

        env.allocate_object(Value::Int(9));
        assert!(env.verify_memory_usage().is_err());
    }

    #[test]
    fn deadline_gate_passes_for_idle_methods() {
        let env = ExecutionEnvironment::new(quiet_config());
        assert!(env.verify_deadline_compliance("nothing_running").is_ok());
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut env = ExecutionEnvironment::new(quiet_config());
        env.shutdown();
        env.shutdown();
    }

    #[test]
    fn interruptible_sleep_returns_after_shutdown() {
        let mut env = ExecutionEnvironment::new(quiet_config());
        env.shutdown();
        let started = Instant::now();
        env.interruptible_sleep(10_000);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
