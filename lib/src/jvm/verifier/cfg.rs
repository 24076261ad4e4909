use crate::jvm::code::{resolve_label, Code, Instruction, Label, Node};
use crate::jvm::{BinaryName, Error, StateErrorKind};
use std::collections::{BTreeSet, HashMap};

/// How control gets from one node to another
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Continuing on to the next node
    FallThrough,

    /// Conditional or unconditional branch
    Jump,

    /// Default or case of a switch
    SwitchCase,

    /// Exception thrown inside a protected range, going to the handler at index `handler` in the
    /// exception table
    Exception { handler: usize },

    /// `jsr` to the start of a subroutine
    Subroutine,

    /// `ret` to the node after a `jsr`
    ///
    /// These edges are conservative: every `ret` gets an edge to after every `jsr`.
    SubroutineReturn,
}

impl EdgeKind {
    fn is_exceptional(&self) -> bool {
        matches!(self, EdgeKind::Exception { .. })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    pub from: usize,
    pub to: usize,
    pub kind: EdgeKind,
}

/// Exception handler with its labels resolved to positions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedHandler {
    /// First protected node
    pub start: usize,

    /// First node after the protected range
    pub end: usize,

    /// Entry point of the handler
    pub handler: usize,

    pub catch_type: Option<BinaryName>,
}

/// Control flow graph of a method body
///
/// There is one graph node per element of [`Code::nodes`] (so the node index is the position in
/// the method body). Edges live in one arena and each node keeps the indices of its incoming and
/// outgoing edges.
#[derive(Clone, Debug)]
pub struct ControlFlowGraph {
    edges: Vec<Edge>,
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
    handlers: Vec<ResolvedHandler>,
    label_positions: HashMap<Label, usize>,

    /// Is the last node a label or frame marker (which would fall off the end if reached)?
    trailing_pseudo_node: bool,
}

impl ControlFlowGraph {
    /// Build the graph for a method body
    ///
    /// Fails if a label is unknown or placed twice, or if the last instruction can fall through
    /// past the end of the code.
    pub fn build(code: &Code) -> Result<ControlFlowGraph, Error> {
        let node_count = code.nodes.len();
        if node_count == 0 {
            return Err(Error::invalid_state(StateErrorKind::FallsOffEnd));
        }

        let label_positions = code.label_positions()?;
        let handlers = code
            .handlers
            .iter()
            .map(|handler| {
                Ok(ResolvedHandler {
                    start: resolve_label(&label_positions, handler.start)?,
                    end: resolve_label(&label_positions, handler.end)?,
                    handler: resolve_label(&label_positions, handler.handler)?,
                    catch_type: handler.catch_type.clone(),
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let mut graph = ControlFlowGraph {
            edges: vec![],
            successors: vec![vec![]; node_count],
            predecessors: vec![vec![]; node_count],
            handlers,
            label_positions,
            trailing_pseudo_node: code.nodes[node_count - 1].instruction().is_none(),
        };

        // Every `ret` can return to right after any `jsr`
        let return_sites: Vec<usize> = code
            .instructions()
            .filter(|(_, insn)| matches!(insn, Instruction::Jsr(_)))
            .map(|(position, _)| position + 1)
            .filter(|position| *position < node_count)
            .collect();

        for (position, node) in code.nodes.iter().enumerate() {
            let insn = match node {
                Node::Instruction(insn) => insn,
                Node::Label(_) | Node::Frame(_) => {
                    if position + 1 < node_count {
                        graph.add_edge(position, position + 1, EdgeKind::FallThrough);
                    }
                    continue;
                }
            };

            if insn.falls_through() {
                if position + 1 >= node_count {
                    return Err(Error::invalid_state(StateErrorKind::FallsOffEnd).at(position));
                }
                graph.add_edge(position, position + 1, EdgeKind::FallThrough);
            }

            let kind = match insn {
                Instruction::Jsr(_) => EdgeKind::Subroutine,
                _ if insn.is_switch() => EdgeKind::SwitchCase,
                _ => EdgeKind::Jump,
            };
            for target in insn.jump_targets() {
                let target = resolve_label(&graph.label_positions, target)
                    .map_err(|err| err.at(position))?;
                graph.add_edge(position, target, kind);
            }

            if let Instruction::Ret(_) = insn {
                for return_site in &return_sites {
                    graph.add_edge(position, *return_site, EdgeKind::SubroutineReturn);
                }
            }
        }

        for handler_idx in 0..graph.handlers.len() {
            let ResolvedHandler {
                start,
                end,
                handler,
                ..
            } = graph.handlers[handler_idx].clone();
            for position in start..end.min(node_count) {
                if code.nodes[position].instruction().is_some() {
                    let kind = EdgeKind::Exception {
                        handler: handler_idx,
                    };
                    graph.add_edge(position, handler, kind);
                }
            }
        }

        Ok(graph)
    }

    /// Add an edge, unless an equivalent one is already there
    ///
    /// Normal edges to the same target are equivalent, as are exception edges for the same
    /// handler.
    fn add_edge(&mut self, from: usize, to: usize, kind: EdgeKind) {
        let duplicate = self.successors[from].iter().any(|edge_idx| {
            let edge = &self.edges[*edge_idx];
            edge.to == to
                && match (edge.kind, kind) {
                    (EdgeKind::Exception { handler: h1 }, EdgeKind::Exception { handler: h2 }) => {
                        h1 == h2
                    }
                    (k1, k2) => !k1.is_exceptional() && !k2.is_exceptional(),
                }
        });
        if duplicate {
            return;
        }

        let edge_idx = self.edges.len();
        self.edges.push(Edge { from, to, kind });
        self.successors[from].push(edge_idx);
        self.predecessors[to].push(edge_idx);
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.successors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.successors.is_empty()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Outgoing edges of a node
    pub fn successors(&self, node: usize) -> impl Iterator<Item = &Edge> + '_ {
        self.successors[node].iter().map(|idx| &self.edges[*idx])
    }

    /// Incoming edges of a node
    pub fn predecessors(&self, node: usize) -> impl Iterator<Item = &Edge> + '_ {
        self.predecessors[node].iter().map(|idx| &self.edges[*idx])
    }

    pub fn handlers(&self) -> &[ResolvedHandler] {
        &self.handlers
    }

    pub fn label_position(&self, label: Label) -> Option<usize> {
        self.label_positions.get(&label).copied()
    }

    /// Would reaching this node mean execution falls off the end of the code?
    pub fn falls_off_end(&self, node: usize) -> bool {
        self.trailing_pseudo_node && node + 1 == self.len()
    }

    /// Nodes entered other than by falling through: targets of jumps, switches, subroutine calls,
    /// and exception handlers
    pub fn branch_targets(&self) -> BTreeSet<usize> {
        self.edges
            .iter()
            .filter(|edge| {
                !matches!(
                    edge.kind,
                    EdgeKind::FallThrough | EdgeKind::SubroutineReturn
                )
            })
            .map(|edge| edge.to)
            .collect()
    }

    /// Which nodes can be reached from the entry (following every edge)
    pub fn reachable(&self) -> Vec<bool> {
        let mut reachable = vec![false; self.len()];
        let mut to_visit = vec![];
        if !self.is_empty() {
            reachable[0] = true;
            to_visit.push(0);
        }
        while let Some(node) = to_visit.pop() {
            for edge in self.successors(node) {
                if !reachable[edge.to] {
                    reachable[edge.to] = true;
                    to_visit.push(edge.to);
                }
            }
        }
        reachable
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{EqComparison, Instruction::*, LabelGenerator, Labels, OrdComparison};

    fn edges_from(graph: &ControlFlowGraph, node: usize) -> Vec<(usize, EdgeKind)> {
        graph.successors(node).map(|edge| (edge.to, edge.kind)).collect()
    }

    #[test]
    fn branches() {
        let mut labels = Labels::new();
        let (else_branch, end) = (labels.fresh_label(), labels.fresh_label());
        let mut code = Code::new(1, 1);
        code.push(ILoad(0)) // 0
            .push(If(OrdComparison::EQ, else_branch)) // 1
            .push(IConst1) // 2
            .push(Goto(end)) // 3
            .place_label(else_branch) // 4
            .push(IConst0) // 5
            .place_label(end) // 6
            .push(IReturn); // 7

        let graph = ControlFlowGraph::build(&code).unwrap();
        assert_eq!(graph.len(), 8);
        assert_eq!(edges_from(&graph, 0), vec![(1, EdgeKind::FallThrough)]);
        assert_eq!(
            edges_from(&graph, 1),
            vec![(2, EdgeKind::FallThrough), (4, EdgeKind::Jump)]
        );
        assert_eq!(edges_from(&graph, 3), vec![(6, EdgeKind::Jump)]);
        assert_eq!(edges_from(&graph, 7), vec![]);
        assert_eq!(graph.predecessors(6).count(), 2);
        assert_eq!(graph.branch_targets(), BTreeSet::from([4, 6]));
        assert!(graph.reachable().iter().all(|r| *r));
    }

    #[test]
    fn switch_targets_are_deduplicated() {
        let mut labels = Labels::new();
        let (one, other) = (labels.fresh_label(), labels.fresh_label());
        let mut code = Code::new(1, 1);
        code.push(ILoad(0))
            .push(TableSwitch {
                low: 0,
                default: other,
                targets: vec![one, one, other],
            })
            .place_label(one)
            .push(Return)
            .place_label(other)
            .push(Return);

        let graph = ControlFlowGraph::build(&code).unwrap();
        assert_eq!(
            edges_from(&graph, 1),
            vec![(4, EdgeKind::SwitchCase), (2, EdgeKind::SwitchCase)]
        );
    }

    #[test]
    fn exception_edges() {
        let mut labels = Labels::new();
        let (start, end, handler) = (
            labels.fresh_label(),
            labels.fresh_label(),
            labels.fresh_label(),
        );
        let mut code = Code::new(2, 1);
        code.place_label(start) // 0
            .push(ALoad(0)) // 1
            .push(AThrow) // 2
            .place_label(end) // 3
            .place_label(handler) // 4
            .push(AThrow) // 5
            .add_handler(start, end, handler, None);

        let graph = ControlFlowGraph::build(&code).unwrap();
        let kind = EdgeKind::Exception { handler: 0 };
        assert_eq!(edges_from(&graph, 0), vec![(1, EdgeKind::FallThrough)]);
        assert_eq!(
            edges_from(&graph, 1),
            vec![(2, EdgeKind::FallThrough), (4, kind)]
        );
        assert_eq!(edges_from(&graph, 2), vec![(4, kind)]);
        assert!(graph.reachable()[4]);
        assert!(!graph.reachable()[3]);
    }

    #[test]
    fn unreachable_nodes() {
        let mut code = Code::new(1, 1);
        code.push(Return).push(IConst0).push(IReturn);

        let graph = ControlFlowGraph::build(&code).unwrap();
        assert_eq!(graph.reachable(), vec![true, false, false]);
        assert_eq!(graph.predecessors(2).count(), 1);
    }

    #[test]
    fn subroutines() {
        let mut labels = Labels::new();
        let subroutine = labels.fresh_label();
        let mut code = Code::new(1, 2);
        code.push(Jsr(subroutine)) // 0
            .push(Return) // 1
            .place_label(subroutine) // 2
            .push(AStore(1)) // 3
            .push(Ret(1)); // 4

        let graph = ControlFlowGraph::build(&code).unwrap();
        assert_eq!(edges_from(&graph, 0), vec![(2, EdgeKind::Subroutine)]);
        assert_eq!(edges_from(&graph, 4), vec![(1, EdgeKind::SubroutineReturn)]);
    }

    #[test]
    fn malformed() {
        let mut labels = Labels::new();
        let nowhere = labels.fresh_label();

        let mut code = Code::new(1, 1);
        code.push(IConst0).push(Pop);
        let err = ControlFlowGraph::build(&code).unwrap_err();
        assert_eq!(err.state_kind(), Some(&StateErrorKind::FallsOffEnd));
        assert_eq!(err.index(), Some(1));

        let mut code = Code::new(1, 1);
        code.push(AConstNull)
            .push(IfNull(EqComparison::EQ, nowhere))
            .push(Return);
        let err = ControlFlowGraph::build(&code).unwrap_err();
        assert!(matches!(
            err.state_kind(),
            Some(StateErrorKind::UnknownLabel(_))
        ));
        assert_eq!(err.index(), Some(1));

        assert!(ControlFlowGraph::build(&Code::new(0, 0)).is_err());

        // A trailing label is only a problem if it is reached
        let mut code = Code::new(0, 0);
        code.push(Return).place_label(nowhere);
        let graph = ControlFlowGraph::build(&code).unwrap();
        assert!(graph.falls_off_end(1));
        assert!(!graph.falls_off_end(0));
    }
}
