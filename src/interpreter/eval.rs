//! Tree-walking evaluator.
//!
//! Exhaustive over [`AstNode`]: every node kind is handled, faults propagate
//! with `?`, and there is no fallthrough arm. Variable resolution is
//! locals-first, then the environment's globals; an unknown name is a fault,
//! not a null.
//!
//! Arithmetic is 32-bit signed with wrapping overflow. Division by zero is
//! the only arithmetic fault.

use std::time::Instant;

use rustc_hash::FxHashMap;

use crate::interpreter::env::ExecutionEnvironment;
use crate::interpreter::errors::RuntimeFault;
use crate::interpreter::loops::LoopExecution;
use crate::memory::value::Value;
use crate::parser::ast::{AstNode, BinOp};

/// Evaluates AST nodes against an environment and a set of local bindings.
pub struct Evaluator<'a> {
    env: &'a ExecutionEnvironment,
    locals: FxHashMap<String, Value>,
}

impl<'a> Evaluator<'a> {
    /// Evaluator with no local bindings; loose expressions use this.
    pub fn new(env: &'a ExecutionEnvironment) -> Self {
        Evaluator {
            env,
            locals: FxHashMap::default(),
        }
    }

    /// Evaluator carrying a method's locals.
    pub fn with_locals(env: &'a ExecutionEnvironment, locals: FxHashMap<String, Value>) -> Self {
        Evaluator { env, locals }
    }

    pub fn env(&self) -> &'a ExecutionEnvironment {
        self.env
    }

    pub fn eval(&self, node: &AstNode) -> Result<Value, RuntimeFault> {
        match node {
            AstNode::Number(n) => Ok(Value::Int(*n)),

            AstNode::Variable(name) => {
                if let Some(value) = self.locals.get(name) {
                    return Ok(value.clone());
                }
                self.env
                    .get_global_variable(name)
                    .ok_or_else(|| RuntimeFault::UndefinedVariable { name: name.clone() })
            }

            AstNode::Binary { op, left, right } => {
                let lhs = self.eval_int(left)?;
                let rhs = self.eval_int(right)?;
                let result = match op {
                    BinOp::Add => lhs.wrapping_add(rhs),
                    BinOp::Sub => lhs.wrapping_sub(rhs),
                    BinOp::Mul => lhs.wrapping_mul(rhs),
                    BinOp::Div => {
                        if rhs == 0 {
                            return Err(RuntimeFault::ArithmeticFault);
                        }
                        lhs.wrapping_div(rhs)
                    }
                };
                Ok(Value::Int(result))
            }

            AstNode::Deadline { ms, body } => {
                let started = Instant::now();
                let result = self.eval(body)?;
                // Complete within budget or fail, wall clock.
                let elapsed_ms = started.elapsed().as_millis() as u64;
                if elapsed_ms > *ms {
                    return Err(RuntimeFault::DeadlineExceeded {
                        limit_ms: *ms,
                        elapsed_ms,
                    });
                }
                Ok(result)
            }

            AstNode::Loop {
                condition,
                body,
                max_iterations,
                timeout_ms,
            } => {
                let mut execution = LoopExecution::new(*max_iterations, *timeout_ms);
                execution.run(self, condition, body)
            }
        }
    }

    fn eval_int(&self, node: &AstNode) -> Result<i32, RuntimeFault> {
        match self.eval(node)? {
            Value::Int(n) => Ok(n),
            other => Err(RuntimeFault::TypeMismatch {
                expected: "int".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }
}
