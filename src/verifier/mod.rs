//! Static safety verifier.
//!
//! A read-only pass over the class/method/AST graph, run before a program is
//! accepted for execution. Findings are *collected*, never thrown: the
//! verifier walks the whole graph and reports everything it sees, and the
//! caller decides through [`Verifier::has_errors`] whether to gate
//! execution. The core never invokes it automatically.
//!
//! Structural risk is bounded through a synthetic depth counter: a loop
//! condition subtree adds 1, a loop body subtree adds 2, a method body adds
//! 1. Exceeding the configured maximum records [`Finding::StackOverflowRisk`]
//! and stops descending that subtree only.

use std::fmt;

use crate::config::DEFAULT_VERIFIER_MAX_DEPTH;
use crate::parser::ast::{AstNode, ClassDef, MethodBody, MethodDef, UNBOUNDED_ITERATIONS};
use crate::types::TypeKind;
use crate::types::TypeSystem;

/// A non-fatal verification finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// Synthetic depth exceeded the configured maximum.
    StackOverflowRisk {
        context: String,
        depth: u32,
        max_depth: u32,
    },
    /// A loop whose max-iteration sentinel means "unbounded".
    InfiniteLoopRisk { context: String },
    /// Inheritance chain longer than two entries.
    MultipleInheritance { class: String, chain_len: usize },
    /// A declared deadline of zero milliseconds can never be met.
    InvalidDeadline { context: String, ms: u64 },
    /// A reference-typed field with no value to dereference.
    NullDereferenceRisk { class: String, field: String },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::StackOverflowRisk {
                context,
                depth,
                max_depth,
            } => write!(
                f,
                "stack overflow risk in {}: depth {} exceeds maximum {}",
                context, depth, max_depth
            ),
            Finding::InfiniteLoopRisk { context } => {
                write!(f, "potential infinite loop in {}", context)
            }
            Finding::MultipleInheritance { class, chain_len } => write!(
                f,
                "multiple inheritance in {}: chain length {}",
                class, chain_len
            ),
            Finding::InvalidDeadline { context, ms } => {
                write!(f, "invalid deadline in {}: {}ms", context, ms)
            }
            Finding::NullDereferenceRisk { class, field } => {
                write!(f, "potential null dereference: {}.{}", class, field)
            }
        }
    }
}

/// Collects findings across any number of `verify_*` calls.
pub struct Verifier {
    max_depth: u32,
    findings: Vec<Finding>,
}

impl Default for Verifier {
    fn default() -> Self {
        Verifier::new(DEFAULT_VERIFIER_MAX_DEPTH)
    }
}

impl Verifier {
    pub fn new(max_depth: u32) -> Self {
        Verifier {
            max_depth,
            findings: Vec::new(),
        }
    }

    /// Verifies a class: inheritance chain, field nullability, every method.
    ///
    /// The type system is consulted to decide which field types are
    /// references (only references can be dereferenced through null).
    pub fn verify_class(&mut self, class: &ClassDef, types: &TypeSystem) {
        let chain_len = class.inheritance_chain().len();
        if chain_len > 2 {
            self.findings.push(Finding::MultipleInheritance {
                class: class.name().to_string(),
                chain_len,
            });
        }

        for field in class.fields() {
            let is_reference = matches!(types.lookup(&field.type_name), Some(TypeKind::Reference));
            if is_reference && field.value == crate::memory::value::Value::Null {
                self.findings.push(Finding::NullDereferenceRisk {
                    class: class.name().to_string(),
                    field: field.name.clone(),
                });
            }
        }

        for method in class.methods() {
            let context = format!("{}.{}", class.name(), method.name());
            self.verify_method(&context, method);
        }
    }

    /// Verifies a method: deadline plausibility plus its body at depth +1.
    pub fn verify_method(&mut self, context: &str, method: &MethodDef) {
        if let Some(ms) = method.deadline_ms() {
            if ms == 0 {
                self.findings.push(Finding::InvalidDeadline {
                    context: context.to_string(),
                    ms,
                });
            }
        }

        if let MethodBody::Ast(body) = method.body() {
            self.verify_node(context, body, 1);
        }
    }

    /// Verifies a bare AST subtree starting from `depth`.
    pub fn verify_node(&mut self, context: &str, node: &AstNode, depth: u32) {
        if depth > self.max_depth {
            self.findings.push(Finding::StackOverflowRisk {
                context: context.to_string(),
                depth,
                max_depth: self.max_depth,
            });
            return;
        }

        match node {
            AstNode::Number(_) | AstNode::Variable(_) => {}
            AstNode::Binary { left, right, .. } => {
                self.verify_node(context, left, depth);
                self.verify_node(context, right, depth);
            }
            AstNode::Deadline { ms, body } => {
                if *ms == 0 {
                    self.findings.push(Finding::InvalidDeadline {
                        context: context.to_string(),
                        ms: *ms,
                    });
                }
                self.verify_node(context, body, depth);
            }
            AstNode::Loop {
                condition,
                body,
                max_iterations,
                ..
            } => {
                self.verify_node(&format!("{}.condition", context), condition, depth + 1);
                self.verify_node(&format!("{}.body", context), body, depth + 2);
                if *max_iterations == UNBOUNDED_ITERATIONS {
                    self.findings.push(Finding::InfiniteLoopRisk {
                        context: context.to_string(),
                    });
                }
            }
        }
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn has_errors(&self) -> bool {
        !self.findings.is_empty()
    }

    pub fn clear_errors(&mut self) {
        self.findings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::FieldDef;

    fn nested_loops(levels: u32) -> AstNode {
        let mut node = AstNode::Number(1);
        for _ in 0..levels {
            node = AstNode::Loop {
                condition: Box::new(AstNode::Number(1)),
                body: Box::new(node),
                max_iterations: 10,
                timeout_ms: 1000,
            };
        }
        node
    }

    #[test]
    fn deep_nesting_is_flagged_but_walk_continues() {
        let mut verifier = Verifier::new(4);
        verifier.verify_node("test", &nested_loops(4), 0);
        assert!(verifier
            .findings()
            .iter()
            .any(|f| matches!(f, Finding::StackOverflowRisk { .. })));

        verifier.clear_errors();
        assert!(!verifier.has_errors());
    }

    #[test]
    fn shallow_nesting_is_clean() {
        let mut verifier = Verifier::new(16);
        verifier.verify_node("test", &nested_loops(2), 0);
        assert!(!verifier.has_errors());
    }

    #[test]
    fn unbounded_loop_is_flagged() {
        let mut verifier = Verifier::default();
        let loop_node = AstNode::Loop {
            condition: Box::new(AstNode::Number(1)),
            body: Box::new(AstNode::Number(1)),
            max_iterations: UNBOUNDED_ITERATIONS,
            timeout_ms: 1000,
        };
        verifier.verify_node("spin", &loop_node, 0);
        assert_eq!(
            verifier.findings(),
            &[Finding::InfiniteLoopRisk {
                context: "spin".to_string()
            }]
        );
    }

    #[test]
    fn three_entry_chain_is_multiple_inheritance() {
        let types = TypeSystem::new(64);
        let mut class = ClassDef::new("C");
        class.set_superclass("B");
        class.set_superclass("A");

        let mut verifier = Verifier::default();
        verifier.verify_class(&class, &types);
        assert!(verifier
            .findings()
            .iter()
            .any(|f| matches!(f, Finding::MultipleInheritance { chain_len: 3, .. })));
    }

    #[test]
    fn null_reference_field_is_flagged_primitive_is_not() {
        let types = TypeSystem::new(64);
        let mut class = ClassDef::new("Device");
        class.add_field(FieldDef::new("id", "String"));
        class.add_field(FieldDef::new("status", "int"));

        let mut verifier = Verifier::default();
        verifier.verify_class(&class, &types);

        let nulls: Vec<_> = verifier
            .findings()
            .iter()
            .filter(|f| matches!(f, Finding::NullDereferenceRisk { .. }))
            .collect();
        assert_eq!(nulls.len(), 1);
    }

    #[test]
    fn zero_deadline_is_flagged_on_methods_and_nodes() {
        let mut method = MethodDef::new_ast("m", vec![], "void", AstNode::Number(0));
        method.set_deadline_ms(0);

        let mut verifier = Verifier::default();
        verifier.verify_method("C.m", &method);
        assert!(verifier
            .findings()
            .iter()
            .any(|f| matches!(f, Finding::InvalidDeadline { ms: 0, .. })));
    }
}
