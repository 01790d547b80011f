//! AST node and program-table definitions.
//!
//! [`AstNode`] is a closed tagged enum with an exhaustive evaluation function
//! in [`crate::interpreter::eval`] — no trait-object dispatch, which keeps
//! evaluation total and lets the verifier pattern-match the same shapes.
//!
//! [`ClassDef`] and [`MethodDef`] persist for the life of the environment
//! once registered; AST nodes for loose expressions are created per parse,
//! immutable, and discarded after evaluation.

use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::interpreter::env::ExecutionEnvironment;
use crate::interpreter::errors::RuntimeFault;
use crate::memory::value::Value;

/// Sentinel for a loop with no iteration bound; the verifier flags it.
pub const UNBOUNDED_ITERATIONS: u32 = u32::MAX;

/// Binary operators of the expression grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        };
        write!(f, "{}", symbol)
    }
}

/// Expression AST. The only node kinds the evaluator knows.
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    /// Integer literal.
    Number(i32),
    /// Variable reference, resolved locals-first then globals.
    Variable(String),
    /// Binary arithmetic over 32-bit signed integers (wrapping).
    Binary {
        op: BinOp,
        left: Box<AstNode>,
        right: Box<AstNode>,
    },
    /// `@Deadline(ms=N)`-wrapped construct: complete within budget or fail.
    Deadline { ms: u64, body: Box<AstNode> },
    /// Bounded loop with an iteration cap and a wall-clock timeout.
    Loop {
        condition: Box<AstNode>,
        body: Box<AstNode>,
        max_iterations: u32,
        timeout_ms: u64,
    },
}

/// A declared field: name, declared type, current value.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub type_name: String,
    pub value: Value,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        FieldDef {
            name: name.into(),
            type_name: type_name.into(),
            value: Value::Null,
        }
    }
}

/// A class: fields, methods, and the recorded inheritance chain.
///
/// The chain starts at the class itself and grows by one entry per
/// `set_superclass` call; the verifier flags chains longer than two, the
/// runtime does not enforce the invariant.
#[derive(Debug, Clone)]
pub struct ClassDef {
    name: String,
    superclass: Option<String>,
    inheritance_chain: Vec<String>,
    fields: FxHashMap<String, FieldDef>,
    methods: FxHashMap<String, MethodDef>,
}

impl ClassDef {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        ClassDef {
            inheritance_chain: vec![name.clone()],
            name,
            superclass: None,
            fields: FxHashMap::default(),
            methods: FxHashMap::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn superclass(&self) -> Option<&str> {
        self.superclass.as_deref()
    }

    /// Records a superclass and extends the inheritance chain.
    pub fn set_superclass(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.inheritance_chain.push(name.clone());
        self.superclass = Some(name);
    }

    pub fn inheritance_chain(&self) -> &[String] {
        &self.inheritance_chain
    }

    pub fn add_field(&mut self, field: FieldDef) {
        self.fields.insert(field.name.clone(), field);
    }

    pub fn add_method(&mut self, method: MethodDef) {
        self.methods.insert(method.name().to_string(), method);
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.values()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    pub fn set_field_value(&mut self, name: &str, value: Value) {
        if let Some(field) = self.fields.get_mut(name) {
            field.value = value;
        }
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDef> {
        self.methods.values()
    }

    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.get(name)
    }

    pub fn method_mut(&mut self, name: &str) -> Option<&mut MethodDef> {
        self.methods.get_mut(name)
    }

    /// Heap ids held by field values; these are collector roots.
    pub fn collect_roots(&self, out: &mut FxHashSet<u64>) {
        for field in self.fields.values() {
            field.value.collect_refs(out);
        }
        for method in self.methods.values() {
            method.collect_roots(out);
        }
    }
}

/// Signature of a native (pre-registered) method implementation.
pub type NativeFn =
    Arc<dyn Fn(&ExecutionEnvironment, &[Value]) -> Result<Value, RuntimeFault> + Send + Sync>;

/// A method body: either an expression AST or a native function.
#[derive(Clone)]
pub enum MethodBody {
    Ast(AstNode),
    Native(NativeFn),
}

impl fmt::Debug for MethodBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodBody::Ast(node) => f.debug_tuple("Ast").field(node).finish(),
            MethodBody::Native(_) => f.write_str("Native(..)"),
        }
    }
}

/// A method: signature, optional declared deadline, locals, and body.
///
/// Locals and parameter values persist on the definition between calls so
/// the collector can treat them as roots, mirroring the globals table.
#[derive(Debug, Clone)]
pub struct MethodDef {
    name: String,
    parameter_types: Vec<String>,
    return_type: String,
    deadline_ms: Option<u64>,
    locals: FxHashMap<String, Value>,
    parameters: Vec<Value>,
    body: MethodBody,
}

impl MethodDef {
    pub fn new_ast(
        name: impl Into<String>,
        parameter_types: Vec<String>,
        return_type: impl Into<String>,
        body: AstNode,
    ) -> Self {
        MethodDef {
            name: name.into(),
            parameter_types,
            return_type: return_type.into(),
            deadline_ms: None,
            locals: FxHashMap::default(),
            parameters: Vec::new(),
            body: MethodBody::Ast(body),
        }
    }

    pub fn new_native(
        name: impl Into<String>,
        parameter_types: Vec<String>,
        return_type: impl Into<String>,
        body: NativeFn,
    ) -> Self {
        MethodDef {
            name: name.into(),
            parameter_types,
            return_type: return_type.into(),
            deadline_ms: None,
            locals: FxHashMap::default(),
            parameters: Vec::new(),
            body: MethodBody::Native(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter_types(&self) -> &[String] {
        &self.parameter_types
    }

    pub fn return_type(&self) -> &str {
        &self.return_type
    }

    pub fn deadline_ms(&self) -> Option<u64> {
        self.deadline_ms
    }

    pub fn set_deadline_ms(&mut self, ms: u64) {
        self.deadline_ms = Some(ms);
    }

    pub fn body(&self) -> &MethodBody {
        &self.body
    }

    pub fn set_local(&mut self, name: impl Into<String>, value: Value) {
        self.locals.insert(name.into(), value);
    }

    pub fn local(&self, name: &str) -> Option<&Value> {
        self.locals.get(name)
    }

    pub fn locals(&self) -> &FxHashMap<String, Value> {
        &self.locals
    }

    /// Stores a parameter value, growing the vector with nulls as needed.
    pub fn set_parameter(&mut self, index: usize, value: Value) {
        while self.parameters.len() <= index {
            self.parameters.push(Value::Null);
        }
        self.parameters[index] = value;
    }

    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    /// Heap ids held by locals and parameter values; collector roots.
    pub fn collect_roots(&self, out: &mut FxHashSet<u64>) {
        for value in self.locals.values() {
            value.collect_refs(out);
        }
        for value in &self.parameters {
            value.collect_refs(out);
        }
    }
}
