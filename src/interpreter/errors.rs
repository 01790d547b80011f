//! Runtime fault types.
//!
//! Every fault aborts the current invocation and propagates to the immediate
//! caller; there is no automatic retry. Memory and deadline checks are
//! advisory gates the caller invokes explicitly, so the corresponding faults
//! only ever come out of those calls.

use thiserror::Error;

/// Faults raised during evaluation or by the advisory gates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeFault {
    #[error("arithmetic fault: division by zero")]
    ArithmeticFault,

    #[error("deadline exceeded: {elapsed_ms}ms elapsed against a {limit_ms}ms budget")]
    DeadlineExceeded { limit_ms: u64, elapsed_ms: u64 },

    #[error("loop timeout exceeded: {timeout_ms}ms")]
    LoopTimeout { timeout_ms: u64 },

    #[error("loop condition must evaluate to boolean, got {found}")]
    NonBooleanCondition { found: String },

    #[error("heap occupancy {used} exceeds safety threshold of budget {budget}")]
    MemoryBudgetExceeded { used: usize, budget: usize },

    #[error("method not found: {name}")]
    MethodNotFound { name: String },

    #[error("class not found: {name}")]
    ClassNotFound { name: String },

    #[error("undefined variable: {name}")]
    UndefinedVariable { name: String },

    #[error("type mismatch: expected {expected}, got {found}")]
    TypeMismatch { expected: String, found: String },
}
