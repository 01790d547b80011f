//! # Introduction
//!
//! retrovm is an embeddable execution runtime for a small statically-typed,
//! class-based language aimed at constrained device programs. It combines a
//! deadline-aware tree-walking evaluator with a background mark-sweep
//! collector and a time-travel state log that can step execution backwards
//! or replay it from a checkpoint.
//!
//! ## Execution pipeline
//!
//! ```text
//! Source → Lexer → Parser → AST → Verifier → Evaluator → Snapshots
//! ```
//!
//! 1. [`parser`] — tokenises the source and builds the expression and
//!    declaration AST.
//! 2. [`types`] — named-type registry, assignability rules, the off-heap
//!    arena, and deadline registration.
//! 3. [`verifier`] — static safety pass; collects non-fatal findings
//!    (overflow risk, unbounded loops, multiple inheritance).
//! 4. [`interpreter`] — the execution environment, evaluator, bounded
//!    loops, collector, and standard library.
//! 5. [`memory`] — tagged [`memory::value::Value`] variants and the object
//!    [`memory::heap::Heap`].
//! 6. [`snapshot`] — bounded snapshot ring plus a named checkpoint for
//!    step-back and replay.
//! 7. [`codegen`] — read-only WebAssembly text-format emission.
//!
//! ## Language surface
//!
//! Types: `int`, `boolean`, `String`, `Object`, `void`, user classes.
//! Constructs: arithmetic expressions, `class` declarations with fields and
//! methods, single inheritance, `@Deadline(ms=N)` annotations, bounded
//! loops with wall-clock timeouts.

pub mod codegen;
pub mod config;
pub mod interpreter;
pub mod memory;
pub mod parser;
pub mod snapshot;
pub mod types;
pub mod verifier;
