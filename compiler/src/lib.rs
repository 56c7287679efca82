pub mod codegen;
pub mod error;
pub mod jumps;

pub use codegen::{compile, CompiledProgram};
pub use error::CompileError;
pub use jumps::Placeholder;
