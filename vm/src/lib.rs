pub mod disassembly;
pub mod error;
pub mod instruction;
pub mod machine;
pub mod opcode;

pub use disassembly::disassemble;
pub use error::RuntimeError;
pub use instruction::Instruction;
pub use machine::{StackFrame, VM};
pub use opcode::OpCode;
