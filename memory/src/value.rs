//! Runtime values.

use std::fmt;
use std::rc::Rc;

/// A single runtime value: the tagged union the register file holds.
///
/// Values are copied on register writes. `Str` and `Closure` are shared
/// handles, so "copying" them aliases the underlying object — which is
/// exactly the sharing the upvalue machinery relies on for closures.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i32),
    Dec(f32),
    Bool(bool),
    Str(Rc<str>),
    /// Handle into [`crate::Heap`]'s closure arena.
    Closure(u32),
}

impl Value {
    #[inline]
    pub fn is_int(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    #[inline]
    pub fn is_dec(&self) -> bool {
        matches!(self, Value::Dec(_))
    }

    #[inline]
    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    #[inline]
    pub fn is_closure(&self) -> bool {
        matches!(self, Value::Closure(_))
    }

    #[inline]
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_dec(&self) -> Option<f32> {
        match self {
            Value::Dec(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_closure(&self) -> Option<u32> {
        match self {
            Value::Closure(handle) => Some(*handle),
            _ => None,
        }
    }

    /// Name of the value's kind, used in runtime error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::Dec(_) => "Dec",
            Value::Bool(_) => "Bool",
            Value::Str(_) => "Str",
            Value::Closure(_) => "Fn",
        }
    }
}

impl fmt::Display for Value {
    /// The textual form `Print` emits: canonical ASCII for integers and
    /// booleans, shortest round-trip form for decimals.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Dec(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{}", s),
            Value::Closure(_) => write!(f, "<fn>"),
        }
    }
}
