use crate::jvm::code::{Instruction, Label};
use crate::jvm::verifier::StackMapFrame;
use crate::jvm::{BinaryName, Error, StateErrorKind};
use std::collections::HashMap;

/// Element of a method body
///
/// Positions in the method (as used for frames and errors) are indices into the node list, so
/// labels and frame markers occupy positions too. They have no effect on the frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    /// Marks the position of a label
    Label(Label),

    /// Actual bytecode instruction
    Instruction(Instruction),

    /// Explicit stack map frame marker describing the state at this position
    Frame(StackMapFrame),
}

impl Node {
    /// Instruction at this node, if the node is an instruction
    pub fn instruction(&self) -> Option<&Instruction> {
        match self {
            Node::Instruction(insn) => Some(insn),
            _ => None,
        }
    }
}

impl From<Instruction> for Node {
    fn from(insn: Instruction) -> Node {
        Node::Instruction(insn)
    }
}

/// Entry in the exception table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Start of the protected range (inclusive)
    pub start: Label,

    /// End of the protected range (exclusive)
    pub end: Label,

    /// Entry point of the handler
    pub handler: Label,

    /// Type of exception caught (`None` for catch-all handlers, as used by `finally`)
    pub catch_type: Option<BinaryName>,
}

/// Method body: a linear list of nodes with an exception table
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Code {
    /// Maximum size of the stack (in slots) through the method
    pub max_stack: u16,

    /// Number of local variable slots
    pub max_locals: u16,

    /// Labels, instructions, and frame markers, in order
    pub nodes: Vec<Node>,

    /// Exception handlers (order matters: earlier handlers take precedence)
    pub handlers: Vec<ExceptionHandler>,
}

impl Code {
    pub fn new(max_stack: u16, max_locals: u16) -> Code {
        Code {
            max_stack,
            max_locals,
            nodes: vec![],
            handlers: vec![],
        }
    }

    /// Append an instruction
    pub fn push(&mut self, insn: Instruction) -> &mut Self {
        self.nodes.push(Node::Instruction(insn));
        self
    }

    /// Mark the current end of the code with a label
    pub fn place_label(&mut self, label: Label) -> &mut Self {
        self.nodes.push(Node::Label(label));
        self
    }

    /// Register an exception handler
    pub fn add_handler(
        &mut self,
        start: Label,
        end: Label,
        handler: Label,
        catch_type: Option<BinaryName>,
    ) -> &mut Self {
        self.handlers.push(ExceptionHandler {
            start,
            end,
            handler,
            catch_type,
        });
        self
    }

    /// Compute where each label is placed, rejecting labels placed more than once
    pub fn label_positions(&self) -> Result<HashMap<Label, usize>, Error> {
        let mut positions = HashMap::new();
        for (position, node) in self.nodes.iter().enumerate() {
            if let Node::Label(label) = node {
                if positions.insert(*label, position).is_some() {
                    return Err(Error::invalid_state(StateErrorKind::DuplicateLabel(
                        label.to_string(),
                    ))
                    .at(position));
                }
            }
        }
        Ok(positions)
    }

    /// Iterate through the instructions, along with their positions
    pub fn instructions(&self) -> impl Iterator<Item = (usize, &Instruction)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(position, node)| node.instruction().map(|insn| (position, insn)))
    }
}

/// Look up where a label is placed
pub fn resolve_label(positions: &HashMap<Label, usize>, label: Label) -> Result<usize, Error> {
    positions
        .get(&label)
        .copied()
        .ok_or_else(|| Error::invalid_state(StateErrorKind::UnknownLabel(label.to_string())))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{LabelGenerator, Labels};

    #[test]
    fn label_positions() {
        let mut labels = Labels::new();
        let (l0, l1, l2) = (
            labels.fresh_label(),
            labels.fresh_label(),
            labels.fresh_label(),
        );
        let mut code = Code::new(1, 1);
        code.place_label(l0)
            .push(Instruction::Nop)
            .place_label(l1)
            .push(Instruction::Return);

        let positions = code.label_positions().unwrap();
        assert_eq!(resolve_label(&positions, l0), Ok(0));
        assert_eq!(resolve_label(&positions, l1), Ok(2));
        assert!(matches!(
            resolve_label(&positions, l2),
            Err(Error::InvalidState {
                kind: StateErrorKind::UnknownLabel(_),
                ..
            })
        ));
        assert_eq!(
            code.instructions().map(|(pos, _)| pos).collect::<Vec<_>>(),
            vec![1, 3]
        );

        code.place_label(l0);
        assert!(matches!(
            code.label_positions(),
            Err(Error::InvalidState {
                index: Some(4),
                kind: StateErrorKind::DuplicateLabel(_),
            })
        ));
    }
}
