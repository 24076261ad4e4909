//! Bytecode representation
//!
//! ### Structure
//!
//! A method body is a linear list of [`Node`]s: [`Instruction`]s interleaved with [`Label`]s
//! (which mark jump targets and exception ranges) and explicit frame markers. Alongside the nodes
//! sits an exception table of [`ExceptionHandler`]s, each protecting a range between two labels.
//! Together these make up the method [`Code`].
//!
//! This is the same shape as the bytecode in a class file, except that offsets are replaced by
//! labels and the many compact encodings of the same instruction are collapsed (see
//! [`Instruction`]).
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se18/html/jvms-6.html#jvms-6.5

mod code;
mod instructions;
mod label;
pub mod opcodes;

pub use code::*;
pub use instructions::*;
pub use label::*;
