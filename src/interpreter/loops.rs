//! Bounded loop execution.
//!
//! A loop carries an iteration cap and a wall-clock timeout, and runs as a
//! small state machine:
//!
//! ```text
//! Running -> Completed          condition false, or iteration cap reached
//! Running -> TimedOut           wall clock past the timeout (checked per
//!                               iteration, before the condition)
//! Running -> ConditionFaulted   condition evaluated to a non-boolean
//! ```
//!
//! Each successful body evaluation appends its result to the iteration
//! history; a faulting body pops the in-progress entry's slot so the history
//! only ever records completed iterations. The loop's value is the history
//! as a list.

use std::time::{Duration, Instant};

use crate::interpreter::errors::RuntimeFault;
use crate::interpreter::eval::Evaluator;
use crate::memory::value::Value;
use crate::parser::ast::AstNode;

/// Where a loop run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Running,
    Completed,
    TimedOut,
    ConditionFaulted,
}

/// Summary of a finished (or aborted) loop run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopMetrics {
    pub iterations_completed: u32,
    pub elapsed: Duration,
    pub phase: LoopPhase,
}

/// One run of a loop node: phase, history, and timing.
pub struct LoopExecution {
    max_iterations: u32,
    timeout: Duration,
    phase: LoopPhase,
    history: Vec<Value>,
    elapsed: Duration,
}

impl LoopExecution {
    pub fn new(max_iterations: u32, timeout_ms: u64) -> Self {
        LoopExecution {
            max_iterations,
            timeout: Duration::from_millis(timeout_ms),
            phase: LoopPhase::Running,
            history: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Drives the loop to a terminal phase. Returns the iteration history as
    /// a list on success; faults propagate and leave the phase terminal.
    pub fn run(
        &mut self,
        eval: &Evaluator<'_>,
        condition: &AstNode,
        body: &AstNode,
    ) -> Result<Value, RuntimeFault> {
        let started = Instant::now();
        self.phase = LoopPhase::Running;
        let mut iterations: u32 = 0;

        let result = loop {
            if started.elapsed() > self.timeout {
                self.phase = LoopPhase::TimedOut;
                break Err(RuntimeFault::LoopTimeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                });
            }

            // The unbounded sentinel is u32::MAX, so the cap comparison
            // covers both cases.
            if iterations >= self.max_iterations {
                self.phase = LoopPhase::Completed;
                break Ok(());
            }

            match eval.eval(condition)? {
                Value::Bool(true) => {}
                Value::Bool(false) => {
                    self.phase = LoopPhase::Completed;
                    break Ok(());
                }
                other => {
                    self.phase = LoopPhase::ConditionFaulted;
                    break Err(RuntimeFault::NonBooleanCondition {
                        found: other.type_name().to_string(),
                    });
                }
            }

            match eval.eval(body) {
                Ok(value) => self.history.push(value),
                Err(fault) => {
                    self.history.pop();
                    break Err(fault);
                }
            }
            iterations += 1;
        };

        self.elapsed = started.elapsed();
        result.map(|_| Value::List(self.history.clone()))
    }

    /// Truncates the history to entries `0..=iteration`, so rolling back to
    /// iteration `k` keeps `k + 1` entries. Requests at or past the end
    /// leave the history unchanged.
    pub fn rollback_to_iteration(&mut self, iteration: usize) {
        self.history.truncate(iteration.saturating_add(1));
    }

    pub fn history(&self) -> &[Value] {
        &self.history
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    pub fn metrics(&self) -> LoopMetrics {
        LoopMetrics {
            iterations_completed: self.history.len() as u32,
            elapsed: self.elapsed,
            phase: self.phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::interpreter::env::ExecutionEnvironment;

    fn env() -> ExecutionEnvironment {
        ExecutionEnvironment::new(RuntimeConfig::default())
    }

    #[test]
    fn iteration_cap_completes_with_full_history() {
        let env = env();
        env.set_global_variable("go", Value::Bool(true));
        let eval = Evaluator::new(&env);

        let mut execution = LoopExecution::new(5, 10_000);
        let result = execution
            .run(
                &eval,
                &AstNode::Variable("go".to_string()),
                &AstNode::Number(7),
            )
            .unwrap();

        assert_eq!(result, Value::List(vec![Value::Int(7); 5]));
        assert_eq!(execution.phase(), LoopPhase::Completed);
        assert_eq!(execution.metrics().iterations_completed, 5);
    }

    #[test]
    fn false_condition_completes_immediately() {
        let env = env();
        env.set_global_variable("go", Value::Bool(false));
        let eval = Evaluator::new(&env);

        let mut execution = LoopExecution::new(100, 10_000);
        let result = execution
            .run(
                &eval,
                &AstNode::Variable("go".to_string()),
                &AstNode::Number(1),
            )
            .unwrap();

        assert_eq!(result, Value::List(vec![]));
        assert_eq!(execution.phase(), LoopPhase::Completed);
    }

    #[test]
    fn non_boolean_condition_faults() {
        let env = env();
        let eval = Evaluator::new(&env);

        let mut execution = LoopExecution::new(10, 10_000);
        let err = execution
            .run(&eval, &AstNode::Number(1), &AstNode::Number(1))
            .unwrap_err();

        assert_eq!(
            err,
            RuntimeFault::NonBooleanCondition {
                found: "int".to_string()
            }
        );
        assert_eq!(execution.phase(), LoopPhase::ConditionFaulted);
    }

    #[test]
    fn zero_timeout_times_out_before_any_iteration() {
        let env = env();
        env.set_global_variable("go", Value::Bool(true));
        let eval = Evaluator::new(&env);

        let mut execution = LoopExecution::new(u32::MAX, 0);
        let err = execution
            .run(
                &eval,
                &AstNode::Variable("go".to_string()),
                &AstNode::Number(1),
            )
            .unwrap_err();

        assert!(matches!(err, RuntimeFault::LoopTimeout { .. }));
        assert_eq!(execution.phase(), LoopPhase::TimedOut);
    }

    #[test]
    fn body_fault_propagates_and_keeps_only_completed_iterations() {
        let env = env();
        env.set_global_variable("go", Value::Bool(true));
        let eval = Evaluator::new(&env);

        let body = AstNode::Binary {
            op: crate::parser::ast::BinOp::Div,
            left: Box::new(AstNode::Number(1)),
            right: Box::new(AstNode::Number(0)),
        };

        let mut execution = LoopExecution::new(10, 10_000);
        let err = execution
            .run(&eval, &AstNode::Variable("go".to_string()), &body)
            .unwrap_err();

        assert_eq!(err, RuntimeFault::ArithmeticFault);
        assert!(execution.history().is_empty());
    }

    #[test]
    fn rollback_truncates_history() {
        let env = env();
        env.set_global_variable("go", Value::Bool(true));
        let eval = Evaluator::new(&env);

        let mut execution = LoopExecution::new(5, 10_000);
        execution
            .run(
                &eval,
                &AstNode::Variable("go".to_string()),
                &AstNode::Number(1),
            )
            .unwrap();

        // Rolling back to iteration 2 keeps iterations 0, 1, and 2.
        execution.rollback_to_iteration(2);
        assert_eq!(execution.history().len(), 3);

        // Past-the-end requests are no-ops.
        execution.rollback_to_iteration(10);
        assert_eq!(execution.history().len(), 3);

        execution.rollback_to_iteration(0);
        assert_eq!(execution.history().len(), 1);
    }
}
