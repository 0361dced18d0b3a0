use super::search_tree::NodeId;
use super::search_tree::SearchNode;
use super::search_tree::SearchTree;
use crate::logic::Conjunction;
use crate::logic::Dnf;
use crate::reason::CoreLiteral;

/// Folds a completed search tree into a single refutation DNF.
///
/// A leaf contributes its stored reasons unchanged. A decision over `edge`
/// combines the branch results by resolution on the edge literal: every
/// positive-branch cube mentioning `co(edge)` is paired with every
/// negative-branch cube mentioning the inverse, dropping both literals;
/// cubes that do not mention the decision literal pass through unchanged.
/// The resulting clauses hold under every coherence completion consistent
/// with the facts known before the search began.
pub(crate) struct TreeResolution<'a> {
    tree: &'a SearchTree,
}

impl<'a> TreeResolution<'a> {
    pub(crate) fn new(tree: &'a SearchTree) -> TreeResolution<'a> {
        TreeResolution { tree }
    }

    pub(crate) fn compute(&self) -> Dnf<CoreLiteral> {
        self.resolve(self.tree.root())
    }

    fn resolve(&self, node: NodeId) -> Dnf<CoreLiteral> {
        match self.tree.node(node) {
            SearchNode::Empty => {
                // A refuted tree has no unexplored branch; reaching one means
                // the undo log was corrupted.
                panic!("tree resolution reached an unexplored branch");
            }
            SearchNode::Leaf { reasons } => Dnf::from_cubes(reasons.clone()),
            SearchNode::Decision {
                edge,
                positive,
                negative,
            } => {
                let positive = self.resolve(*positive);
                let negative = self.resolve(*negative);

                let literal = CoreLiteral::Coherence(*edge);
                let opposite = CoreLiteral::Coherence(edge.inverse());

                let mut combined: Vec<Conjunction<CoreLiteral>> = Vec::new();
                let mut positive_mentioning = Vec::new();
                for cube in positive.cubes() {
                    if cube.contains(&literal) {
                        positive_mentioning.push(cube);
                    } else {
                        combined.push(cube.clone());
                    }
                }
                let mut negative_mentioning = Vec::new();
                for cube in negative.cubes() {
                    if cube.contains(&opposite) {
                        negative_mentioning.push(cube);
                    } else {
                        combined.push(cube.clone());
                    }
                }

                for positive_cube in &positive_mentioning {
                    for negative_cube in &negative_mentioning {
                        combined.push(
                            positive_cube
                                .without(&literal)
                                .and(&negative_cube.without(&opposite)),
                        );
                    }
                }

                Dnf::from_cubes(combined)
            }
        }
    }
}
