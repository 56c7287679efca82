//! Scope records produced by the analyzer and consumed by the compiler.
//!
//! The compiler assumes `lookup_index` values follow registration order:
//! a local's register is `1 + lookup_index` within its frame, and an
//! upvalue's `lookup_index` addresses either the parent's locals (when
//! `local_to_parent`) or the parent's upvalue list.

use std::collections::HashMap;

use crate::types::Type;

/// One named local (including parameters) of a function scope, in
/// declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalRecord {
    pub name: String,
    pub is_parameter: bool,
    pub lookup_index: usize,
}

/// One captured variable of a function scope, in first-use order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpvalueRecord {
    pub name: String,
    pub local_to_parent: bool,
    pub lookup_index: usize,
}

/// The variable environment of one function scope (or the program root)
/// while it is being analyzed.
pub(crate) struct Scope {
    pub variables: HashMap<String, Type>,
    /// Registration order of `variables` keys; a name's position here is
    /// its `lookup_index`.
    pub order: Vec<String>,
    pub parameters: Vec<String>,
    pub upvalues: HashMap<String, UpvalueRecord>,
    pub upvalue_order: Vec<String>,
    /// Return type of the enclosing function; `None` at the program root.
    pub return_type: Option<Type>,
}

impl Scope {
    pub fn new(return_type: Option<Type>) -> Self {
        Self {
            variables: HashMap::new(),
            order: Vec::new(),
            parameters: Vec::new(),
            upvalues: HashMap::new(),
            upvalue_order: Vec::new(),
            return_type,
        }
    }

    pub fn register_variable(&mut self, name: &str, ty: Type) {
        self.order.push(name.to_string());
        self.variables.insert(name.to_string(), ty);
    }

    /// Position of a registered variable, i.e. its `lookup_index`.
    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|n| n == name)
    }

    /// Drain this scope into the ordered record lists the typed tree
    /// carries.
    pub fn into_records(self) -> (Vec<LocalRecord>, Vec<UpvalueRecord>) {
        let Scope {
            order,
            parameters,
            mut upvalues,
            upvalue_order,
            ..
        } = self;

        let locals = order
            .iter()
            .enumerate()
            .map(|(i, name)| LocalRecord {
                name: name.clone(),
                is_parameter: parameters.iter().any(|p| p == name),
                lookup_index: i,
            })
            .collect();
        let upvalues = upvalue_order
            .iter()
            .map(|name| {
                upvalues
                    .remove(name)
                    .expect("registered upvalue has a record")
            })
            .collect();
        (locals, upvalues)
    }
}
