//! The virtual machine: call frames and the interpreter loop.

mod frame;
mod vm;

pub use frame::{StackFrame, REGISTER_COUNT};
pub use vm::VM;
