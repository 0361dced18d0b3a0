use crate::logic::Conjunction;
use crate::model::Edge;
use crate::reason::CoreLiteral;

/// Index of a node in the search-tree arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct NodeId(usize);

/// A node of the backtracking-search record.
#[derive(Clone, Debug)]
#[allow(variant_size_differences)]
pub(crate) enum SearchNode {
    /// Not yet explored.
    Empty,
    /// A tested coherence guess: `positive` explores the edge, `negative`
    /// its inverse.
    Decision {
        edge: Edge,
        positive: NodeId,
        negative: NodeId,
    },
    /// Terminal: the reasons for the inconsistency found along this path.
    Leaf {
        reasons: Vec<Conjunction<CoreLiteral>>,
    },
}

/// A decision node whose children are allocated but which is not yet part of
/// the tree. The search explores under a pending decision first and only
/// attaches it once a branch actually refutes.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PendingDecision {
    pub(crate) edge: Edge,
    pub(crate) positive: NodeId,
    pub(crate) negative: NodeId,
}

/// Records the shape of the backtracking search as a rooted binary tree.
///
/// Nodes live in an arena and are addressed by stable indices; "replacing" a
/// node overwrites its arena slot, so parents keep pointing at the same
/// position and subtrees of discarded speculation simply become unreachable.
#[derive(Clone, Debug)]
pub(crate) struct SearchTree {
    nodes: Vec<SearchNode>,
}

impl SearchTree {
    pub(crate) fn new() -> SearchTree {
        SearchTree {
            nodes: vec![SearchNode::Empty],
        }
    }

    pub(crate) fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub(crate) fn node(&self, id: NodeId) -> &SearchNode {
        &self.nodes[id.0]
    }

    /// Allocate a detached decision over `edge` with two unexplored children.
    pub(crate) fn prepare_decision(&mut self, edge: Edge) -> PendingDecision {
        let positive = self.allocate(SearchNode::Empty);
        let negative = self.allocate(SearchNode::Empty);
        PendingDecision {
            edge,
            positive,
            negative,
        }
    }

    /// Overwrite `target` with the pending decision, attaching its subtrees.
    pub(crate) fn attach(&mut self, target: NodeId, pending: PendingDecision) {
        self.nodes[target.0] = SearchNode::Decision {
            edge: pending.edge,
            positive: pending.positive,
            negative: pending.negative,
        };
    }

    /// Overwrite `target` with a leaf holding the violation reasons.
    pub(crate) fn make_leaf(&mut self, target: NodeId, reasons: Vec<Conjunction<CoreLiteral>>) {
        self.nodes[target.0] = SearchNode::Leaf { reasons };
    }

    /// The unexplored nodes still reachable from the root. Outside a refuted
    /// tree there is exactly one: the tip of the active search spine.
    pub(crate) fn reachable_empty_nodes(&self) -> Vec<NodeId> {
        let mut empties = Vec::new();
        let mut pending = vec![self.root()];
        while let Some(id) = pending.pop() {
            match self.node(id) {
                SearchNode::Empty => empties.push(id),
                SearchNode::Decision {
                    positive, negative, ..
                } => {
                    pending.push(*negative);
                    pending.push(*positive);
                }
                SearchNode::Leaf { .. } => {}
            }
        }
        empties
    }

    fn allocate(&mut self, node: SearchNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }
}
