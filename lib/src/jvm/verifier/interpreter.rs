use super::MethodContext;
use crate::jvm::code::Instruction;
use crate::jvm::{BinaryName, Error, FieldType};
use crate::util::Width;
use std::fmt::Debug;

/// Contents of one stack entry or local variable slot, as seen by an [`Interpreter`]
///
/// Wide values (`long` and `double`) report a width of 2. In the locals, they are followed by a
/// [`Value::top`] filler slot. On the stack, they are a single entry counting as two slots.
pub trait Value: Clone + Eq + Debug + Width {
    /// Unusable value (unset locals, the filler after wide locals, incompatible merges)
    fn top() -> Self;

    fn is_top(&self) -> bool {
        *self == Self::top()
    }

    /// If this value is a subroutine return address, the position it returns to
    fn return_address(&self) -> Option<usize>;
}

/// Semantics of instructions over abstract values
///
/// There is one operation per category of instruction, named after the number of operands that
/// get popped off the stack. [`super::Frame::execute`] does the stack bookkeeping (popping the
/// right number of operands, `dup`/`swap` shuffling, local variable access) and delegates to the
/// interpreter to check operands and compute results. Operations return [`Error::InvalidOpcode`]
/// when handed an instruction outside their category.
///
/// Interpreters are shared by reference across analyses, so they should not carry mutable state.
pub trait Interpreter {
    type Value: Value;

    /// Does this interpreter handle the opcode at all?
    fn accepts(&self, _opcode: u8) -> bool {
        true
    }

    /// Value of the given type (used for parameters)
    fn new_value(&self, field_type: &FieldType) -> Self::Value;

    /// Value of `this` on entry to an instance method
    fn new_this(&self, method: &MethodContext) -> Self::Value;

    /// Value on the stack when entering an exception handler catching `catch_type` (or anything,
    /// for `None`)
    fn new_exception(&self, catch_type: Option<&BinaryName>) -> Self::Value;

    /// Instructions that push a value without popping anything: constants, `getstatic`, `new`,
    /// and `jsr`
    ///
    /// `position` is the position of the instruction in the method body.
    fn new_operation(&self, position: usize, insn: &Instruction) -> Result<Self::Value, Error>;

    /// Instructions that move a value: loads and stores of local variables
    fn copy_operation(&self, insn: &Instruction, value: &Self::Value)
        -> Result<Self::Value, Error>;

    /// Instructions that pop one value: negation, conversions, `iinc` (on the local), unary
    /// branches and switches, `putstatic`, `getfield`, array creation, `arraylength`, `athrow`,
    /// `checkcast`, `instanceof`, and the monitors
    fn unary_operation(
        &self,
        insn: &Instruction,
        value: &Self::Value,
    ) -> Result<Option<Self::Value>, Error>;

    /// Instructions that pop two values: array loads, binary arithmetic, comparisons, binary
    /// branches, and `putfield`
    fn binary_operation(
        &self,
        insn: &Instruction,
        value1: &Self::Value,
        value2: &Self::Value,
    ) -> Result<Option<Self::Value>, Error>;

    /// Instructions that pop three values: array stores
    fn ternary_operation(
        &self,
        insn: &Instruction,
        value1: &Self::Value,
        value2: &Self::Value,
        value3: &Self::Value,
    ) -> Result<(), Error>;

    /// Instructions that pop a variable number of values: invocations and `multianewarray`
    fn nary_operation(
        &self,
        insn: &Instruction,
        values: &[Self::Value],
    ) -> Result<Option<Self::Value>, Error>;

    /// Value returning instructions, checked against the declared return type
    fn return_operation(
        &self,
        insn: &Instruction,
        value: &Self::Value,
        expected: &FieldType,
    ) -> Result<(), Error>;

    /// Initialized version of an uninitialized receiver, after `<init>` has been called on it
    fn initialize(&self, value: &Self::Value, method: &MethodContext)
        -> Result<Self::Value, Error>;

    /// Join of two values reaching the same slot along different paths
    ///
    /// This must be commutative and idempotent, and only ever go up the lattice.
    fn merge(&self, value1: &Self::Value, value2: &Self::Value) -> Result<Self::Value, Error>;
}
