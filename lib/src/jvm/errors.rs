/// Failure while computing frames for a method
///
/// Both variants are fatal to the analysis in progress: there is no partial result. When the
/// failure can be pinned on a particular node in the method body, `index` is its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An opcode outside of the set accepted by the interpreter or tracker (or an opcode used
    /// with the wrong category of operands)
    InvalidOpcode { opcode: u8, index: Option<usize> },

    /// A structural precondition was violated: the bytecode is malformed or the embedding is
    /// incorrect
    InvalidState {
        index: Option<usize>,
        kind: StateErrorKind,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateErrorKind {
    /// Tried to pop from an empty operand stack
    EmptyStack,

    /// Pushing would exceed the declared maximum stack size (in slots)
    StackOverflow { max_stack: usize },

    /// Stack value has the wrong width for the instruction (eg. `pop` of a `long`)
    InvalidWidth(usize),

    /// Local variable index is out of bounds, or targets the filler half of a wide local
    InvalidLocalIndex(usize),

    /// Local variable read before anything was stored in it
    UninitializedLocal(usize),

    /// Operand has a type the instruction cannot accept
    InvalidType {
        expected: &'static str,
        found: String,
    },

    /// Merging two frames whose stacks have different depths
    IncompatibleStackHeights(usize, usize),

    /// Merging two frames whose locals have different lengths
    IncompatibleLocals(usize, usize),

    /// The last instruction in the method can fall through past the end of the code
    FallsOffEnd,

    /// Branch refers to a label that is never placed
    UnknownLabel(String),

    /// The same label is placed twice
    DuplicateLabel(String),

    /// Externally supplied frame is not in the full form
    UnsupportedFrame(&'static str),

    /// Type hierarchy has no information about a class
    MissingClass(String),

    /// Malformed type or method descriptor
    BadDescriptor(String),

    /// Malformed class or member name
    BadName(String),

    /// `ret` on a local that does not hold a return address
    NotAReturnAddress(usize),

    /// `<init>` called on something that is already initialized
    NotUninitialized(String),
}

impl Error {
    pub fn invalid_opcode(opcode: u8) -> Error {
        Error::InvalidOpcode {
            opcode,
            index: None,
        }
    }

    pub fn invalid_state(kind: StateErrorKind) -> Error {
        Error::InvalidState { index: None, kind }
    }

    /// Attach the position of the node that caused the error (unless one is already attached)
    pub fn at(self, position: usize) -> Error {
        match self {
            Error::InvalidOpcode {
                opcode,
                index: None,
            } => Error::InvalidOpcode {
                opcode,
                index: Some(position),
            },
            Error::InvalidState { kind, index: None } => Error::InvalidState {
                kind,
                index: Some(position),
            },
            other => other,
        }
    }

    /// Position of the node that caused the error, if known
    pub fn index(&self) -> Option<usize> {
        match self {
            Error::InvalidOpcode { index, .. } | Error::InvalidState { index, .. } => *index,
        }
    }

    /// Underlying structural failure, if this is an `InvalidState` error
    pub fn state_kind(&self) -> Option<&StateErrorKind> {
        match self {
            Error::InvalidState { kind, .. } => Some(kind),
            Error::InvalidOpcode { .. } => None,
        }
    }
}

impl From<StateErrorKind> for Error {
    fn from(kind: StateErrorKind) -> Error {
        Error::invalid_state(kind)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn attach_position_once() {
        let err = Error::invalid_state(StateErrorKind::EmptyStack).at(3).at(7);
        assert_eq!(err.index(), Some(3));
        assert_eq!(err.state_kind(), Some(&StateErrorKind::EmptyStack));

        let err = Error::invalid_opcode(0xa8).at(1);
        assert_eq!(
            err,
            Error::InvalidOpcode {
                opcode: 0xa8,
                index: Some(1)
            }
        );
        assert_eq!(err.state_kind(), None);
    }
}
