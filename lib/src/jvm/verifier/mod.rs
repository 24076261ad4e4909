//! Stack map frame computation
//!
//! For any specific instruction inside a method body, the stack and locals should have the same
//! structure, regardless of which control flow was used to reach that instruction. In other words:
//! although the values on the stack and in the locals may obviously be different, the types and
//! order of the stack and local variables cannot. This information is the _frame_ at that point
//! (represented using [`Frame`]), and the class file format requires an explicit _stack map frame_
//! (see [`StackMapFrame`]) at every position that is the target of a jump, which the JVM uses
//! for [verification by type-checking][0].
//!
//! Frames are computed over abstract values. The [`Interpreter`] trait defines what those values
//! are and how each instruction transforms them, while [`Frame::execute`] does the stack and local
//! variable bookkeeping common to every interpreter. [`BasicVerifier`] is the interpreter used
//! for stack map frames: its values are [`VerificationType`]s, slightly augmented versions of
//! field types that take into account initialization and null.
//!
//! There are two ways of driving the interpreter over a method body:
//!
//!   - [`Analyzer`] builds a [`ControlFlowGraph`] and runs a fixed point over it, merging frames
//!     where control flow joins. This handles arbitrary control flow, including exception
//!     handlers and `jsr`/`ret` subroutines.
//!
//!   - [`FrameTracker`] follows instructions in a single forward pass as they are emitted, with no
//!     merging at all. This is enough for straight-line code (such as a constructor prologue) and
//!     is much cheaper.
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.10.1

mod analyzer;
mod basic;
mod cfg;
mod frame;
mod interpreter;
mod method;
mod settings;
mod stack_map;
mod tracker;
mod types;

pub use analyzer::*;
pub use basic::*;
pub use cfg::*;
pub use frame::*;
pub use interpreter::*;
pub use method::*;
pub use settings::*;
pub use stack_map::*;
pub use tracker::*;
pub use types::*;
