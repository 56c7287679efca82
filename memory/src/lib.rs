pub mod heap;
pub mod prototype;
pub mod value;

pub use heap::{ClosureObj, Heap, UpvalueCell, UpvalueLocation};
pub use prototype::FuncPrototype;
pub use value::Value;
