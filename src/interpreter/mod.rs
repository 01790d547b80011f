//! Execution: the environment, the evaluator, loop execution, collection,
//! and the standard library.
//!
//! [`env::ExecutionEnvironment`] is the entry point; everything else in this
//! module serves it. Evaluation is single-threaded; only the background
//! collector in [`gc`] runs alongside it, synchronized through the
//! environment's world lock.

pub mod env;
pub mod errors;
pub mod eval;
mod gc;
pub mod loops;
pub mod stdlib;
