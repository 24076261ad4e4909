use super::{Frame, Interpreter, MethodContext, StackMapFrame, TrackerSettings, VerificationType};
use crate::jvm::code::{Instruction, Label, Node};
use crate::jvm::{Error, StateErrorKind};
use std::collections::HashSet;
use std::iter::Peekable;

/// Single-pass frame tracking while instructions are being emitted
///
/// The tracker keeps one live frame and updates it as each instruction goes by. There is no
/// control flow graph and no merging: at a point where control flow joins, the caller must either
/// know the frame is unchanged or supply the frame explicitly with [`FrameTracker::visit_frame`].
///
/// Unlike the batch analysis, there is no declared `max_locals`: locals grow as they are stored
/// to.
pub struct FrameTracker<'i, I: Interpreter + ?Sized> {
    interpreter: &'i I,
    method: MethodContext,
    settings: TrackerSettings,
    frame: Frame<I::Value>,

    /// Number of instructions visited so far (used to position errors and `new` values)
    position: usize,

    max_stack: usize,
    max_locals: usize,
}

impl<'i, I> FrameTracker<'i, I>
where
    I: Interpreter + ?Sized,
{
    /// Start tracking at the entry to a method
    pub fn new(
        method: MethodContext,
        interpreter: &'i I,
        settings: TrackerSettings,
    ) -> Result<FrameTracker<'i, I>, Error> {
        let frame = method.entry_frame(interpreter, None, None)?;
        let max_locals = frame.locals_used();
        log::debug!("Tracking frames for {}", method);
        Ok(FrameTracker {
            interpreter,
            method,
            settings,
            frame,
            position: 0,
            max_stack: 0,
            max_locals,
        })
    }

    /// Current live frame
    pub fn frame(&self) -> &Frame<I::Value> {
        &self.frame
    }

    pub fn method(&self) -> &MethodContext {
        &self.method
    }

    /// Position of the next node
    pub fn position(&self) -> usize {
        self.position
    }

    /// Largest stack size (in slots) seen so far
    pub fn max_stack(&self) -> usize {
        self.max_stack
    }

    /// Largest number of locals seen so far
    pub fn max_locals(&self) -> usize {
        self.max_locals
    }

    /// Update the live frame with the effect of an instruction
    ///
    /// On failure, the live frame is left as it was before the instruction.
    pub fn visit_instruction(&mut self, insn: &Instruction) -> Result<(), Error> {
        let opcode = insn.opcode();
        if !self.settings.accepted_opcodes.contains(opcode) {
            return Err(Error::invalid_opcode(opcode).at(self.position));
        }

        let mut updated = self.frame.clone();
        updated
            .execute(
                self.position,
                insn,
                &self.method,
                self.interpreter,
                self.settings.return_check,
            )
            .map_err(|err| err.at(self.position))?;
        self.frame = updated;
        self.record_sizes();
        self.position += 1;
        Ok(())
    }

    fn record_sizes(&mut self) {
        self.max_stack = self.max_stack.max(self.frame.stack_slots());
        self.max_locals = self.max_locals.max(self.frame.locals_used());
    }
}

impl<'i, I> FrameTracker<'i, I>
where
    I: Interpreter<Value = VerificationType> + ?Sized,
{
    /// Update the live frame with any node
    pub fn visit(&mut self, node: &Node) -> Result<(), Error> {
        match node {
            Node::Instruction(insn) => self.visit_instruction(insn),
            Node::Label(_) => {
                self.position += 1;
                Ok(())
            }
            Node::Frame(frame) => self.visit_frame(frame),
        }
    }

    /// Replace the live frame with an explicit one
    ///
    /// Only full frames are accepted, since there is no reliable previous frame to apply a
    /// compact one to.
    pub fn visit_frame(&mut self, frame: &StackMapFrame) -> Result<(), Error> {
        match frame {
            StackMapFrame::Full { locals, stack } => {
                self.frame = Frame::expand(locals, stack.clone(), None);
                self.record_sizes();
                self.position += 1;
                Ok(())
            }
            other => Err(
                Error::invalid_state(StateErrorKind::UnsupportedFrame(other.kind()))
                    .at(self.position),
            ),
        }
    }

    /// Snapshot the live frame as a frame marker
    pub fn insert_frame(&self) -> StackMapFrame {
        StackMapFrame::full(&self.frame)
    }
}

/// Pull-based iterator that tracks frames over a node stream and inserts a frame marker after
/// labels in a chosen set
///
/// Consecutive labels and frame markers all sit at the same bytecode offset, so each such run gets
/// at most one marker: it goes after the last label of a run containing a chosen label, unless the
/// run already has a frame marker. The marker is computed from the live frame at that point, so
/// the labels should only be reachable by code whose frame matches (eg. forward jumps in a
/// straight-line constructor prologue).
pub struct FrameInserter<'i, I, N>
where
    I: Interpreter<Value = VerificationType> + ?Sized,
    N: Iterator<Item = Node>,
{
    tracker: FrameTracker<'i, I>,
    nodes: Peekable<N>,
    targets: HashSet<Label>,

    /// Marker queued up to be yielded next
    queued: Option<Node>,

    /// Does the current run of labels and markers contain a chosen label?
    run_has_target: bool,

    /// Does the current run of labels and markers already contain a marker?
    run_has_frame: bool,

    failed: bool,
}

impl<'i, I, N> FrameInserter<'i, I, N>
where
    I: Interpreter<Value = VerificationType> + ?Sized,
    N: Iterator<Item = Node>,
{
    pub fn new(
        tracker: FrameTracker<'i, I>,
        nodes: impl IntoIterator<Item = Node, IntoIter = N>,
        targets: HashSet<Label>,
    ) -> FrameInserter<'i, I, N> {
        FrameInserter {
            tracker,
            nodes: nodes.into_iter().peekable(),
            targets,
            queued: None,
            run_has_target: false,
            run_has_frame: false,
            failed: false,
        }
    }

    /// Recover the tracker (eg. to read off the maximum stack and locals)
    pub fn into_tracker(self) -> FrameTracker<'i, I> {
        self.tracker
    }
}

impl<'i, I, N> Iterator for FrameInserter<'i, I, N>
where
    I: Interpreter<Value = VerificationType> + ?Sized,
    N: Iterator<Item = Node>,
{
    type Item = Result<Node, Error>;

    fn next(&mut self) -> Option<Result<Node, Error>> {
        if self.failed {
            return None;
        }

        if let Some(marker) = self.queued.take() {
            if let Err(err) = self.tracker.visit(&marker) {
                self.failed = true;
                return Some(Err(err));
            }
            return Some(Ok(marker));
        }

        let node = self.nodes.next()?;
        if let Err(err) = self.tracker.visit(&node) {
            self.failed = true;
            return Some(Err(err));
        }

        match &node {
            Node::Instruction(_) => {
                self.run_has_target = false;
                self.run_has_frame = false;
            }
            Node::Label(label) => {
                self.run_has_target |= self.targets.contains(label);
                let run_ends = matches!(self.nodes.peek(), Some(Node::Instruction(_)));
                if run_ends && self.run_has_target && !self.run_has_frame {
                    self.run_has_frame = true;
                    self.queued = Some(Node::Frame(self.tracker.insert_frame()));
                }
            }
            Node::Frame(_) => self.run_has_frame = true,
        }
        Some(Ok(node))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_graph::ClassHierarchy;
    use crate::jvm::code::Instruction::*;
    use crate::jvm::verifier::{BasicVerifier, VerificationType::*};
    use crate::jvm::MethodAccessFlags;

    fn static_method(descriptor: &str) -> MethodContext {
        MethodContext::parse("Foo", MethodAccessFlags::STATIC, "foo", descriptor).unwrap()
    }

    #[test]
    fn failed_instruction_leaves_frame_alone() {
        let hierarchy = ClassHierarchy::new();
        let verifier = BasicVerifier::new(&hierarchy);
        let mut tracker =
            FrameTracker::new(static_method("(I)V"), &verifier, TrackerSettings::new()).unwrap();

        tracker.visit_instruction(&ILoad(0)).unwrap();
        let err = tracker.visit_instruction(&LNeg).unwrap_err();
        assert_eq!(err.index(), Some(1));
        assert_eq!(tracker.frame().stack(), &[Integer]);
        assert_eq!(tracker.position(), 1);
    }

    #[test]
    fn sizes() {
        let hierarchy = ClassHierarchy::new();
        let verifier = BasicVerifier::new(&hierarchy);
        let mut tracker =
            FrameTracker::new(static_method("()V"), &verifier, TrackerSettings::new()).unwrap();
        assert_eq!(tracker.max_locals(), 0);

        tracker.visit_instruction(&DConst0).unwrap();
        tracker.visit_instruction(&Dup2).unwrap();
        tracker.visit_instruction(&DStore(1)).unwrap();
        assert_eq!(tracker.max_stack(), 4);
        assert_eq!(tracker.max_locals(), 3);
        assert_eq!(tracker.frame().locals(), &[Top, Double, Top]);

        // Trailing `top` locals from a frame marker are not counted
        let mut tracker =
            FrameTracker::new(static_method("()V"), &verifier, TrackerSettings::new()).unwrap();
        tracker
            .visit_frame(&StackMapFrame::Full {
                locals: vec![Integer, Top, Top],
                stack: vec![],
            })
            .unwrap();
        assert_eq!(tracker.frame().locals().len(), 3);
        assert_eq!(tracker.max_locals(), 1);
    }
}
