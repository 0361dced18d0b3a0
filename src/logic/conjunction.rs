use std::fmt::Display;

use super::Literal;
use super::OrderResult;
use super::PartialCompare;

/// An immutable set of literals denoting their logical AND.
///
/// The literal vector is sorted and deduplicated on construction, so equality
/// and hashing are structural. The empty conjunction is TRUE; a conjunction
/// containing a literal together with its opposite collapses to the designated
/// FALSE value.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Conjunction<L> {
    is_false: bool,
    literals: Vec<L>,
}

impl<L: Literal> Conjunction<L> {
    /// The empty conjunction, i.e. TRUE.
    pub fn top() -> Self {
        Conjunction {
            is_false: false,
            literals: Vec::new(),
        }
    }

    /// The designated contradictory conjunction, i.e. FALSE.
    pub fn bot() -> Self {
        Conjunction {
            is_false: true,
            literals: Vec::new(),
        }
    }

    pub fn singleton(literal: L) -> Self {
        Conjunction {
            is_false: false,
            literals: vec![literal],
        }
    }

    pub fn from_literals(literals: impl IntoIterator<Item = L>) -> Self {
        let mut literals: Vec<L> = literals.into_iter().collect();
        literals.sort();
        literals.dedup();

        let contradictory = literals.iter().any(|lit| {
            lit.opposite()
                .is_some_and(|opp| literals.binary_search(&opp).is_ok())
        });
        if contradictory {
            return Conjunction::bot();
        }

        Conjunction {
            is_false: false,
            literals,
        }
    }

    pub fn is_true(&self) -> bool {
        !self.is_false && self.literals.is_empty()
    }

    pub fn is_false(&self) -> bool {
        self.is_false
    }

    pub fn size(&self) -> usize {
        self.literals.len()
    }

    pub fn literals(&self) -> &[L] {
        &self.literals
    }

    pub fn contains(&self, literal: &L) -> bool {
        self.literals.binary_search(literal).is_ok()
    }

    /// The number of literals that can take part in resolution. Reasons with
    /// a lower complexity produce fewer resolvents down the line and are
    /// preferred when several reasons explain the same violation.
    pub fn resolution_complexity(&self) -> usize {
        self.literals
            .iter()
            .filter(|lit| lit.has_opposite())
            .count()
    }

    /// The conjunction of both literal sets; FALSE if the union is
    /// contradictory or either input is FALSE.
    pub fn and(&self, other: &Self) -> Self {
        if self.is_false || other.is_false {
            return Conjunction::bot();
        }
        Conjunction::from_literals(
            self.literals
                .iter()
                .chain(other.literals.iter())
                .cloned(),
        )
    }

    /// Classical resolution: if the two conjunctions disagree on exactly one
    /// opposite pair, the resolvent is their union minus that pair. In every
    /// other case the conjunctions do not resolve and FALSE is returned.
    pub fn resolve(&self, other: &Self) -> Self {
        if self.is_false || other.is_false {
            return Conjunction::bot();
        }

        let mut pivot: Option<(&L, L)> = None;
        for lit in &self.literals {
            let Some(opp) = lit.opposite() else {
                continue;
            };
            if other.contains(&opp) {
                if pivot.is_some() {
                    // More than one opposite pair: the resolvent would be
                    // tautologically weak, treat as non-resolvable.
                    return Conjunction::bot();
                }
                pivot = Some((lit, opp));
            }
        }

        let Some((lit, opp)) = pivot else {
            return Conjunction::bot();
        };

        Conjunction::from_literals(
            self.literals
                .iter()
                .filter(|l| *l != lit)
                .chain(other.literals.iter().filter(|l| **l != opp))
                .cloned(),
        )
    }

    /// This conjunction with the given literal removed, if present.
    pub fn without(&self, literal: &L) -> Self {
        if !self.contains(literal) {
            return self.clone();
        }
        Conjunction {
            is_false: self.is_false,
            literals: self
                .literals
                .iter()
                .filter(|l| *l != literal)
                .cloned()
                .collect(),
        }
    }

    /// Whether every literal of `other` also appears in `self`.
    pub(crate) fn is_superset_of(&self, other: &Self) -> bool {
        if other.literals.len() > self.literals.len() {
            return false;
        }
        other.literals.iter().all(|lit| self.contains(lit))
    }
}

impl<L: Literal> PartialCompare for Conjunction<L> {
    /// Subset inclusion on the literal sets: `Lt` means a strict subset.
    fn compare_partial(&self, other: &Self) -> OrderResult {
        if self.is_false || other.is_false {
            return if self.is_false && other.is_false {
                OrderResult::Eq
            } else {
                OrderResult::Incomp
            };
        }

        match (self.is_superset_of(other), other.is_superset_of(self)) {
            (true, true) => OrderResult::Eq,
            (true, false) => OrderResult::Gt,
            (false, true) => OrderResult::Lt,
            (false, false) => OrderResult::Incomp,
        }
    }
}

impl<L: Literal> From<Vec<L>> for Conjunction<L> {
    fn from(literals: Vec<L>) -> Self {
        Conjunction::from_literals(literals)
    }
}

impl<L: Literal + Display> Display for Conjunction<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_false {
            return write!(f, "FALSE");
        }
        if self.literals.is_empty() {
            return write!(f, "TRUE");
        }
        let rendered: Vec<String> = self.literals.iter().map(|l| l.to_string()).collect();
        write!(f, "({})", rendered.join(" & "))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::lit;
    use super::super::tests::TestLit;
    use super::Conjunction;
    use super::OrderResult;
    use super::PartialCompare;

    #[test]
    fn opposite_pair_collapses_to_false() {
        let cube = Conjunction::from_literals([lit(1), lit(-1), lit(2)]);
        assert!(cube.is_false());
        assert_eq!(cube, Conjunction::bot());
    }

    #[test]
    fn construction_deduplicates() {
        let cube = Conjunction::from_literals([lit(3), lit(1), lit(3)]);
        assert_eq!(cube.size(), 2);
        assert_eq!(cube, Conjunction::from_literals([lit(1), lit(3)]));
    }

    #[test]
    fn resolve_cancels_exactly_one_pair() {
        let left = Conjunction::from_literals([lit(1), lit(2)]);
        let right = Conjunction::from_literals([lit(-1), lit(3)]);

        let resolvent = left.resolve(&right);

        assert!(!resolvent.contains(&lit(1)));
        assert!(!resolvent.contains(&lit(-1)));
        assert_eq!(resolvent, Conjunction::from_literals([lit(2), lit(3)]));
    }

    #[test]
    fn resolve_rejects_multiple_pairs() {
        let left = Conjunction::from_literals([lit(1), lit(2)]);
        let right = Conjunction::from_literals([lit(-1), lit(-2)]);
        assert!(left.resolve(&right).is_false());
    }

    #[test]
    fn resolve_without_pair_is_false() {
        let left = Conjunction::from_literals([lit(1)]);
        let right = Conjunction::from_literals([lit(2)]);
        assert!(left.resolve(&right).is_false());
    }

    #[test]
    fn partial_order_follows_subset_inclusion() {
        let small: Conjunction<TestLit> = Conjunction::from_literals([lit(1)]);
        let large = Conjunction::from_literals([lit(1), lit(2)]);
        let other = Conjunction::from_literals([lit(3)]);

        assert_eq!(small.compare_partial(&large), OrderResult::Lt);
        assert_eq!(large.compare_partial(&small), OrderResult::Gt);
        assert_eq!(small.compare_partial(&small.clone()), OrderResult::Eq);
        assert_eq!(small.compare_partial(&other), OrderResult::Incomp);
    }

    #[test]
    fn and_merges_and_detects_contradiction() {
        let left = Conjunction::from_literals([lit(1)]);
        let right = Conjunction::from_literals([lit(2)]);
        assert_eq!(
            left.and(&right),
            Conjunction::from_literals([lit(1), lit(2)])
        );

        let negated = Conjunction::from_literals([lit(-1)]);
        assert!(left.and(&negated).is_false());
    }
}
