use super::{
    AnalyzerSettings, ControlFlowGraph, EdgeKind, Frame, Interpreter, MethodContext, ReturnCheck,
    StackMapFrame, Value, VerificationType,
};
use crate::jvm::code::{Code, Instruction, Node};
use crate::jvm::{Error, StateErrorKind};
use std::collections::{BTreeSet, HashSet, VecDeque};

/// Sorted return addresses live in a frame
///
/// Frames at the same node are only merged when their contexts match. Outside of subroutines, the
/// context is always empty.
pub type ReturnContext = Vec<usize>;

fn return_context<V: Value>(frame: &Frame<V>) -> ReturnContext {
    let mut context: ReturnContext = frame
        .locals()
        .iter()
        .chain(frame.stack())
        .filter_map(Value::return_address)
        .collect();
    context.sort_unstable();
    context.dedup();
    context
}

/// Batch frame computation over a whole method body
///
/// The analysis is a worklist fixed point over the [`ControlFlowGraph`]: the input frame of the
/// entry is seeded from the method signature, each dequeued node is run through the interpreter,
/// and the result is merged into the input frames of its successors. A successor whose frame
/// changed goes back on the worklist. Since merges only ever generalize values, this terminates.
pub struct Analyzer<'i, I: ?Sized> {
    interpreter: &'i I,
    settings: AnalyzerSettings,
}

impl<'i, I> Analyzer<'i, I>
where
    I: Interpreter + ?Sized,
{
    pub fn new(interpreter: &'i I) -> Analyzer<'i, I> {
        Analyzer {
            interpreter,
            settings: AnalyzerSettings::new(),
        }
    }

    pub fn with_settings(mut self, settings: AnalyzerSettings) -> Analyzer<'i, I> {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Compute the input frame of every node in the method body
    pub fn analyze(
        &self,
        method: &MethodContext,
        code: &Code,
    ) -> Result<Analysis<I::Value>, Error> {
        log::debug!("Analyzing {} ({} nodes)", method, code.nodes.len());

        let cfg = ControlFlowGraph::build(code)?;
        let entry = method.entry_frame(
            self.interpreter,
            Some(code.max_locals as usize),
            Some(code.max_stack as usize),
        )?;

        let mut state = FixedPoint {
            frames: vec![vec![]; code.nodes.len()],
            worklist: VecDeque::new(),
            pending: HashSet::new(),
        };
        state
            .merge_into(0, entry.clone(), self.interpreter)
            .map_err(|err| err.at(0))?;

        let mut max_stack = 0;
        let mut max_locals = method.parameter_slots();
        let mut iterations = 0;

        while let Some((node, set_idx)) = state.worklist.pop_front() {
            state.pending.remove(&(node, set_idx));
            iterations += 1;

            let input = state.frames[node][set_idx].1.clone();
            max_stack = max_stack.max(input.stack_slots());
            max_locals = max_locals.max(input.locals_used());

            let insn = match &code.nodes[node] {
                Node::Instruction(insn) => insn,
                Node::Label(_) | Node::Frame(_) => {
                    if cfg.falls_off_end(node) {
                        return Err(Error::invalid_state(StateErrorKind::FallsOffEnd).at(node));
                    }
                    for edge in cfg.successors(node) {
                        state
                            .merge_into(edge.to, input.clone(), self.interpreter)
                            .map_err(|err| err.at(edge.to))?;
                    }
                    continue;
                }
            };

            if !self.settings.accepts(insn.opcode()) {
                return Err(Error::invalid_opcode(insn.opcode()).at(node));
            }
            let mut output = input.clone();
            output
                .execute(node, insn, method, self.interpreter, ReturnCheck::Descriptor)
                .map_err(|err| err.at(node))?;
            max_stack = max_stack.max(output.stack_slots());
            max_locals = max_locals.max(output.locals_used());

            for edge in cfg.successors(node) {
                match edge.kind {
                    EdgeKind::Exception { handler } => {
                        let catch_type = cfg.handlers()[handler].catch_type.as_ref();
                        let mut caught = input.clone();
                        caught.clear_stack();
                        caught
                            .push(self.interpreter.new_exception(catch_type))
                            .map_err(|err| err.at(node))?;
                        state
                            .merge_into(edge.to, caught, self.interpreter)
                            .map_err(|err| err.at(edge.to))?;
                    }

                    // Handled below, using the actual return address
                    EdgeKind::SubroutineReturn => (),

                    _ => state
                        .merge_into(edge.to, output.clone(), self.interpreter)
                        .map_err(|err| err.at(edge.to))?,
                }
            }

            if let Instruction::Ret(local) = insn {
                let local = *local as usize;
                let return_to = input
                    .get_local(local)
                    .and_then(|value| {
                        value.return_address().ok_or_else(|| {
                            Error::invalid_state(StateErrorKind::NotAReturnAddress(local))
                        })
                    })
                    .map_err(|err| err.at(node))?;
                if return_to >= code.nodes.len() {
                    return Err(Error::invalid_state(StateErrorKind::FallsOffEnd).at(node));
                }
                state
                    .merge_into(return_to, output, self.interpreter)
                    .map_err(|err| err.at(return_to))?;
            }
        }

        // Summarize parallel frames into one frame per node
        let mut frames = Vec::with_capacity(state.frames.len());
        for (node, parallel) in state.frames.iter().enumerate() {
            let mut parallel = parallel.iter();
            let summary = match parallel.next() {
                None => None,
                Some((_, first)) => {
                    let mut summary = first.clone();
                    for (_, frame) in parallel {
                        summary
                            .merge(frame, self.interpreter)
                            .map_err(|err| err.at(node))?;
                    }
                    Some(summary)
                }
            };
            frames.push(summary);
        }

        log::debug!(
            "Analyzed {} in {} iterations (max stack {}, max locals {})",
            method,
            iterations,
            max_stack,
            max_locals
        );

        let frame_positions = frame_positions(code, &cfg.branch_targets(), &frames);

        Ok(Analysis {
            frames,
            frame_positions,
            parallel: state.frames,
            entry,
            cfg,
            max_stack,
            max_locals,
            iterations,
        })
    }
}

/// Positions of the labels that get an explicit frame
///
/// Consecutive labels (and frame markers) share one bytecode offset, so each such run gets at
/// most one frame, after its last label. A run needs one when any of its labels is a reachable
/// branch target.
fn frame_positions<V>(
    code: &Code,
    targets: &BTreeSet<usize>,
    frames: &[Option<Frame<V>>],
) -> Vec<usize> {
    let mut positions = vec![];
    let mut last_label = None;
    let mut run_is_target = false;
    for (position, node) in code.nodes.iter().enumerate() {
        match node {
            Node::Label(label) => {
                last_label = Some(position);
                if targets.contains(&position) {
                    if frames[position].is_some() {
                        run_is_target = true;
                    } else {
                        log::warn!(
                            "Branch target {} at {} is unreachable, so it gets no frame",
                            label,
                            position
                        );
                    }
                }
            }
            Node::Frame(_) => (),
            Node::Instruction(_) => {
                match last_label {
                    Some(label_position) if run_is_target => positions.push(label_position),
                    _ => (),
                }
                last_label = None;
                run_is_target = false;
            }
        }
    }
    positions
}

/// Worklist and frame sets for one run of the analysis
struct FixedPoint<V> {
    /// Parallel input frames at each node, keyed by their return context
    frames: Vec<Vec<(ReturnContext, Frame<V>)>>,

    /// Node and index into its parallel frames
    worklist: VecDeque<(usize, usize)>,

    /// Entries currently in the worklist
    pending: HashSet<(usize, usize)>,
}

impl<V: Value> FixedPoint<V> {
    /// Merge a frame into the input frames of a node, queueing the node if anything changed
    ///
    /// The context of a set entry is fixed when the entry is created, even if later merges lose
    /// some of its return addresses.
    fn merge_into<I>(&mut self, node: usize, frame: Frame<V>, interpreter: &I) -> Result<(), Error>
    where
        I: Interpreter<Value = V> + ?Sized,
    {
        let context = return_context(&frame);
        let parallel = &mut self.frames[node];
        let set_idx = match parallel.iter().position(|(existing, _)| *existing == context) {
            Some(set_idx) => {
                if !parallel[set_idx].1.merge(&frame, interpreter)? {
                    return Ok(());
                }
                log::trace!("Frame changed at node {} (context {:?})", node, context);
                set_idx
            }
            None => {
                parallel.push((context, frame));
                parallel.len() - 1
            }
        };

        if self.pending.insert((node, set_idx)) {
            log::trace!("Queueing node {}", node);
            self.worklist.push_back((node, set_idx));
        }
        Ok(())
    }
}

/// Result of analyzing a method body
#[derive(Debug)]
pub struct Analysis<V> {
    frames: Vec<Option<Frame<V>>>,
    frame_positions: Vec<usize>,
    parallel: Vec<Vec<(ReturnContext, Frame<V>)>>,
    entry: Frame<V>,
    cfg: ControlFlowGraph,
    max_stack: usize,
    max_locals: usize,
    iterations: usize,
}

impl<V: Value> Analysis<V> {
    /// Input frame of the node at the given position, or `None` if it is unreachable
    ///
    /// When the node is reached from several subroutine contexts, this is the merge of all of
    /// them.
    pub fn frame(&self, position: usize) -> Option<&Frame<V>> {
        self.frames.get(position).and_then(Option::as_ref)
    }

    /// Input frames of all nodes, in order
    pub fn frames(&self) -> &[Option<Frame<V>>] {
        &self.frames
    }

    /// Input frames of a node, one per return context reaching it
    pub fn parallel_frames(
        &self,
        position: usize,
    ) -> impl Iterator<Item = (&[usize], &Frame<V>)> + '_ {
        self.parallel
            .get(position)
            .into_iter()
            .flatten()
            .map(|(context, frame)| (context.as_slice(), frame))
    }

    pub fn is_reachable(&self, position: usize) -> bool {
        self.frame(position).is_some()
    }

    /// Frame on entry to the method
    pub fn entry_frame(&self) -> &Frame<V> {
        &self.entry
    }

    /// Largest stack size (in slots) over all reachable nodes
    pub fn max_stack(&self) -> usize {
        self.max_stack
    }

    /// Number of local slots used (at least enough for the parameters)
    pub fn max_locals(&self) -> usize {
        self.max_locals
    }

    pub fn cfg(&self) -> &ControlFlowGraph {
        &self.cfg
    }

    /// Number of nodes processed before reaching the fixed point
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Positions of the labels that need an explicit frame, in order
    ///
    /// This is the last label of every run of labels containing a reachable branch target.
    pub fn frame_positions(&self) -> &[usize] {
        &self.frame_positions
    }
}

impl Analysis<VerificationType> {
    /// Rewrite the analyzed code, placing a full frame marker after each of the
    /// [`frame_positions`](Analysis::frame_positions)
    ///
    /// Existing frame markers are dropped. `code` must be the code that was analyzed.
    pub fn insert_frames(&self, code: &Code) -> Vec<Node> {
        let mut nodes = Vec::with_capacity(code.nodes.len() + self.frame_positions.len());
        let mut positions = self.frame_positions.iter().peekable();

        for (position, node) in code.nodes.iter().enumerate() {
            if let Node::Frame(_) = node {
                continue;
            }
            nodes.push(node.clone());
            if positions.next_if_eq(&&position).is_some() {
                if let Some(frame) = self.frame(position) {
                    nodes.push(Node::Frame(StackMapFrame::full(frame)));
                }
            }
        }

        nodes
    }

    /// Stack map table entries for the reachable branch targets, each one as compact as possible
    /// relative to the one before it (the first is relative to the entry frame)
    pub fn stack_map_frames(&self) -> Vec<(usize, StackMapFrame)> {
        let mut previous_locals = self.entry.compressed_locals();
        let mut stack_map = vec![];
        for &position in self.frame_positions() {
            if let Some(frame) = self.frame(position) {
                let locals = frame.compressed_locals();
                let stack_map_frame =
                    StackMapFrame::between(&previous_locals, &locals, frame.stack());
                stack_map.push((position, stack_map_frame));
                previous_locals = locals;
            }
        }
        stack_map
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_graph::ClassHierarchy;
    use crate::jvm::code::{Instruction::*, LabelGenerator, Labels, OrdComparison};
    use crate::jvm::verifier::{BasicVerifier, VerificationType::*};
    use crate::jvm::MethodAccessFlags;

    #[test]
    fn straight_line() {
        let hierarchy = ClassHierarchy::new();
        let verifier = BasicVerifier::new(&hierarchy);
        let method =
            MethodContext::parse("Foo", MethodAccessFlags::STATIC, "add", "(JJ)J").unwrap();
        let mut code = Code::new(4, 4);
        code.push(LLoad(0)).push(LLoad(2)).push(LAdd).push(LReturn);

        let analysis = Analyzer::new(&verifier).analyze(&method, &code).unwrap();
        assert!(analysis.frame(0).unwrap().stack().is_empty());
        assert_eq!(analysis.frame(2).unwrap().stack(), &[Long, Long]);
        assert_eq!(analysis.frame(3).unwrap().stack(), &[Long]);
        assert_eq!(analysis.frame(4), None);
        assert_eq!(analysis.max_stack(), 4);
        assert_eq!(analysis.max_locals(), 4);
        assert_eq!(analysis.iterations(), 4);
        assert!(analysis.frame_positions().is_empty());
    }

    #[test]
    fn return_contexts() {
        let mut frame = Frame::new(vec![ReturnAddress(7), Integer], None);
        frame.push(ReturnAddress(3)).unwrap();
        frame.push(ReturnAddress(7)).unwrap();
        assert_eq!(return_context(&frame), vec![3, 7]);
        assert_eq!(return_context(&Frame::new(vec![Top, Integer], None)), vec![]);
    }

    #[test]
    fn stack_map_frames_are_compact() {
        let hierarchy = ClassHierarchy::new();
        let verifier = BasicVerifier::new(&hierarchy);
        let method =
            MethodContext::parse("Foo", MethodAccessFlags::STATIC, "count", "(I)V").unwrap();

        // for (int i = 0; i < n; i++) {}
        let mut labels = Labels::new();
        let (check, body) = (labels.fresh_label(), labels.fresh_label());
        let mut code = Code::new(2, 2);
        code.push(IConst0) // 0
            .push(IStore(1)) // 1
            .push(Goto(check)) // 2
            .place_label(body) // 3
            .push(IInc(1, 1)) // 4
            .place_label(check) // 5
            .push(ILoad(1)) // 6
            .push(ILoad(0)) // 7
            .push(IfICmp(OrdComparison::LT, body)) // 8
            .push(Return); // 9

        let analysis = Analyzer::new(&verifier).analyze(&method, &code).unwrap();
        assert_eq!(analysis.frame_positions(), &[3, 5]);
        assert_eq!(
            analysis.stack_map_frames(),
            vec![
                (3, StackMapFrame::Append(vec![Integer])),
                (5, StackMapFrame::Same)
            ]
        );
    }
}
