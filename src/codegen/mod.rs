//! WebAssembly text-format emission.
//!
//! A read-only pass over registered classes and methods that renders WAT
//! scaffolding: module header with host imports, one memory/data section per
//! class, one `(func ...)` per method with its signature lowered to wasm
//! value types. Bodies are not lowered; the emitter produces linkable
//! skeletons for ahead-of-time toolchains, and never mutates the runtime
//! state it reads.
//!
//! Type lowering: `int` and `boolean` are `i32`; reference types (including
//! `String`) are `i32` pointers into linear memory; `void` has no result.

use std::fmt::Write as _;

use crate::parser::ast::{ClassDef, MethodDef};

/// Emits WAT scaffolding for classes and methods.
#[derive(Debug, Default)]
pub struct WatEmitter;

impl WatEmitter {
    pub fn new() -> Self {
        WatEmitter
    }

    /// Lowers a declared type name to its wasm value type. References are
    /// pointers, so everything except `void` is `i32`.
    fn wasm_type(type_name: &str) -> &'static str {
        match type_name {
            "void" => "none",
            _ => "i32",
        }
    }

    /// Renders one function skeleton: name, params, result, a scratch local.
    pub fn emit_method(&self, method: &MethodDef) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "(func ${}", method.name());

        for (index, param_type) in method.parameter_types().iter().enumerate() {
            let _ = writeln!(
                out,
                "  (param ${} {})",
                index,
                Self::wasm_type(param_type)
            );
        }

        if method.return_type() != "void" {
            let _ = writeln!(out, "  (result {})", Self::wasm_type(method.return_type()));
        }

        let _ = writeln!(out, "  (local $temp i32)");
        out.push_str(")\n");
        out
    }

    /// Renders a class: a memory section, a data section naming its fields,
    /// and a skeleton per method.
    pub fn emit_class(&self, class: &ClassDef) -> String {
        let mut out = String::new();
        out.push_str("(memory 1)\n");

        out.push_str("(data (i32.const 0) \"");
        let mut field_names: Vec<&str> = class.fields().map(|f| f.name.as_str()).collect();
        field_names.sort_unstable();
        for name in field_names {
            let _ = write!(out, "{}\\00", name);
        }
        out.push_str("\")\n");

        let mut methods: Vec<&MethodDef> = class.methods().collect();
        methods.sort_unstable_by_key(|m| m.name());
        for method in methods {
            out.push_str(&self.emit_method(method));
        }
        out
    }

    /// Renders a whole module: host imports, then every class.
    pub fn emit_module(&self, classes: &[ClassDef]) -> String {
        let mut out = String::new();
        out.push_str("(module\n");
        out.push_str("  (import \"env\" \"memory\" (memory 1))\n");
        out.push_str("  (import \"env\" \"console.log\" (func $log (param i32)))\n");
        for class in classes {
            out.push_str(&self.emit_class(class));
        }
        out.push_str(")\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::{AstNode, FieldDef};

    #[test]
    fn method_signature_lowering() {
        let method = MethodDef::new_ast(
            "combine",
            vec!["int".to_string(), "String".to_string()],
            "boolean",
            AstNode::Number(0),
        );
        let wat = WatEmitter::new().emit_method(&method);

        assert!(wat.starts_with("(func $combine\n"));
        assert!(wat.contains("(param $0 i32)"));
        assert!(wat.contains("(param $1 i32)"));
        assert!(wat.contains("(result i32)"));
    }

    #[test]
    fn void_methods_have_no_result() {
        let method = MethodDef::new_ast("fire", vec![], "void", AstNode::Number(0));
        let wat = WatEmitter::new().emit_method(&method);
        assert!(!wat.contains("(result"));
    }

    #[test]
    fn class_emission_names_fields_and_wraps_methods() {
        let mut class = ClassDef::new("Device");
        class.add_field(FieldDef::new("id", "String"));
        class.add_field(FieldDef::new("status", "int"));
        class.add_method(MethodDef::new_ast("getStatus", vec![], "int", AstNode::Number(0)));

        let wat = WatEmitter::new().emit_class(&class);
        assert!(wat.contains("(memory 1)"));
        assert!(wat.contains("id\\00"));
        assert!(wat.contains("status\\00"));
        assert!(wat.contains("(func $getStatus"));
    }

    #[test]
    fn module_wraps_classes_with_imports() {
        let wat = WatEmitter::new().emit_module(&[ClassDef::new("Empty")]);
        assert!(wat.starts_with("(module\n"));
        assert!(wat.contains("console.log"));
        assert!(wat.ends_with(")\n"));
    }
}
