//! Compiled function prototypes.

use twill_parser::{LocalRecord, UpvalueRecord};

/// Static description of one compiled function: its bytecode, its string
/// constant pool, and the scope records the analyzer assigned.
///
/// Prototypes are immutable once the compiler returns and are shared by
/// handle (`Rc`) across every closure instantiated from them. A prototype
/// cannot run by itself: pairing it with a live upvalue vector produces a
/// closure, and the same prototype may be instantiated many times with
/// different upvalues.
#[derive(Clone, Debug, Default)]
pub struct FuncPrototype {
    /// Raw encoded instruction stream.
    pub bytecode: Vec<u8>,
    /// String constants referenced by `StrConst`. Integer, decimal and
    /// boolean literals are embedded directly in the instruction stream.
    pub constants: Vec<String>,
    /// One record per named local, parameters included, in declaration
    /// order. A local's register is `1 + lookup_index`.
    pub locals: Vec<LocalRecord>,
    /// How to resolve each upvalue when a closure is built over this
    /// prototype, in the order `LoadUpVal`/`SetUpVal` index them.
    pub upvalues: Vec<UpvalueRecord>,
}
