//! Compiler errors.
//!
//! Only capacity limits surface as errors. A malformed input tree is a
//! front-end contract violation and panics instead.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The register stack grew past the frame's 256 registers.
    RegisterOverflow,
    /// More locals than the reserved register window can hold.
    TooManyLocals { count: usize },
    /// A string literal reached the compiler with the `strings` feature
    /// disabled.
    StringsDisabled,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::RegisterOverflow => {
                write!(f, "expression too complex: frame register stack exhausted")
            }
            CompileError::TooManyLocals { count } => {
                write!(f, "too many locals in one function ({} declared)", count)
            }
            CompileError::StringsDisabled => {
                write!(f, "string constants are disabled in this build")
            }
        }
    }
}

impl std::error::Error for CompileError {}
