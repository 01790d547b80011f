//! Tagged runtime values.
//!
//! Scalars (`Null`, `Int`, `Bool`, and heap ids) are stored inline wherever a
//! value lives; non-scalar payloads (`Str`, `List`) are boxed onto the object
//! heap and referenced through [`Value::Ref`]. The split keeps root marking
//! uniform: the collector only ever has to look for `Ref` ids.

use std::fmt;

use rustc_hash::FxHashSet;

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent / uninitialized value.
    Null,
    /// 32-bit signed integer.
    Int(i32),
    /// Boolean.
    Bool(bool),
    /// String payload. Boxed onto the heap when stored in a global, local,
    /// parameter, or field.
    Str(String),
    /// Ordered list payload (loop iteration histories evaluate to these).
    List(Vec<Value>),
    /// Heap object id produced by `allocate_object`.
    Ref(u64),
}

impl Value {
    /// Whether this value is stored inline rather than boxed onto the heap.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Int(_) | Value::Bool(_) | Value::Ref(_)
        )
    }

    /// Human-readable type name, used in fault messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "String",
            Value::List(_) => "List",
            Value::Ref(_) => "ref",
        }
    }

    /// Collects every heap id directly reachable from this value into `out`.
    ///
    /// Payloads can themselves contain refs (a `List` of boxed strings, for
    /// example), so marking recurses through containers.
    pub fn collect_refs(&self, out: &mut FxHashSet<u64>) {
        match self {
            Value::Ref(id) => {
                out.insert(*id);
            }
            Value::List(items) => {
                for item in items {
                    item.collect_refs(out);
                }
            }
            Value::Null | Value::Int(_) | Value::Bool(_) | Value::Str(_) => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Ref(id) => write!(f, "#{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_split_matches_boxing_rule() {
        assert!(Value::Int(1).is_scalar());
        assert!(Value::Bool(true).is_scalar());
        assert!(Value::Null.is_scalar());
        assert!(Value::Ref(7).is_scalar());
        assert!(!Value::Str("x".to_string()).is_scalar());
        assert!(!Value::List(vec![]).is_scalar());
    }

    #[test]
    fn refs_collected_through_lists() {
        let value = Value::List(vec![
            Value::Int(1),
            Value::Ref(3),
            Value::List(vec![Value::Ref(9)]),
        ]);
        let mut refs = FxHashSet::default();
        value.collect_refs(&mut refs);
        assert!(refs.contains(&3));
        assert!(refs.contains(&9));
        assert_eq!(refs.len(), 2);
    }
}
