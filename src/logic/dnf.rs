use std::fmt::Display;
use std::hash::Hash;
use std::hash::Hasher;

use fnv::FnvHasher;

use super::Conjunction;
use super::Literal;
use super::OrderResult;
use super::PartialCompare;

/// A formally minimal disjunction of [`Conjunction`]s ("cubes").
///
/// Immutable. FALSE is the empty cube set and TRUE the single empty cube;
/// FALSE is the least element of the partial order and TRUE the largest.
/// Minimality is kept as an invariant: no cube is FALSE and no cube is a
/// strict superset of another cube in the same disjunction. Minimality is
/// weak in the sense that only domination is removed; disjunctions of the
/// form `p | !p` are not folded to TRUE.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dnf<L> {
    cubes: Vec<Conjunction<L>>,
}

impl<L: Literal> Dnf<L> {
    /// The empty disjunction, i.e. FALSE.
    pub fn bot() -> Self {
        Dnf { cubes: Vec::new() }
    }

    /// The disjunction holding only the empty cube, i.e. TRUE.
    pub fn top() -> Self {
        Dnf {
            cubes: vec![Conjunction::top()],
        }
    }

    pub fn from_literal(literal: L) -> Self {
        Dnf::from_cube(Conjunction::singleton(literal))
    }

    pub fn from_cube(cube: Conjunction<L>) -> Self {
        if cube.is_false() {
            return Dnf::bot();
        }
        Dnf { cubes: vec![cube] }
    }

    pub fn from_cubes(cubes: impl IntoIterator<Item = Conjunction<L>>) -> Self {
        Dnf {
            cubes: reduce(cubes.into_iter().collect()),
        }
    }

    pub fn is_false(&self) -> bool {
        self.cubes.is_empty()
    }

    pub fn is_trivially_true(&self) -> bool {
        self.cubes.len() == 1 && self.cubes[0].is_true()
    }

    pub fn num_cubes(&self) -> usize {
        self.cubes.len()
    }

    /// The total number of literal occurrences across all cubes.
    pub fn size(&self) -> usize {
        self.cubes.iter().map(Conjunction::size).sum()
    }

    pub fn cubes(&self) -> &[Conjunction<L>] {
        &self.cubes
    }

    pub fn into_cubes(self) -> Vec<Conjunction<L>> {
        self.cubes
    }

    pub fn or(&self, other: &Self) -> Self {
        if self.is_trivially_true() || other.is_trivially_true() {
            return Dnf::top();
        }
        if self.is_false() {
            return other.clone();
        }
        if other.is_false() {
            return self.clone();
        }
        Dnf::from_cubes(self.cubes.iter().chain(other.cubes.iter()).cloned())
    }

    pub fn and(&self, other: &Self) -> Self {
        if self.is_false() || other.is_false() {
            return Dnf::bot();
        }
        if self.is_trivially_true() {
            return other.clone();
        }
        if other.is_trivially_true() {
            return self.clone();
        }

        let mut products = Vec::with_capacity(self.num_cubes() * other.num_cubes());
        for cube1 in &self.cubes {
            for cube2 in &other.cubes {
                products.push(cube1.and(cube2));
            }
        }
        Dnf::from_cubes(products)
    }

    /// This disjunction with the given cubes removed. Does not re-reduce: a
    /// subset of a minimal cube set is still minimal.
    pub fn remove(&self, cubes: &[Conjunction<L>]) -> Self {
        if self.is_trivially_true()
            || self.is_false()
            || !self.cubes.iter().any(|cube| cubes.contains(cube))
        {
            return self.clone();
        }
        Dnf {
            cubes: self
                .cubes
                .iter()
                .filter(|cube| !cubes.contains(cube))
                .cloned()
                .collect(),
        }
    }

    /// Close the cube set under pairwise resolution, i.e. repeatedly add every
    /// resolvent of two cubes until a fixed point is reached.
    pub fn compute_all_resolvents(&self) -> Self {
        let mut result = self.clone();
        loop {
            let old = result.clone();
            for cube1 in &old.cubes {
                for cube2 in &old.cubes {
                    result = result.or(&Dnf::from_cube(cube1.resolve(cube2)));
                }
            }
            if result == old {
                return result;
            }
        }
    }
}

/// Drops FALSE cubes, duplicates and dominated (strict-superset) cubes.
fn reduce<L: Literal>(cubes: Vec<Conjunction<L>>) -> Vec<Conjunction<L>> {
    let mut cubes: Vec<Conjunction<L>> =
        cubes.into_iter().filter(|cube| !cube.is_false()).collect();
    cubes.sort();
    cubes.dedup();

    // Domination by a cube that is itself dominated is fine: strict-superset
    // chains always bottom out at a cube that stays.
    let dominated: Vec<bool> = cubes
        .iter()
        .map(|cube| {
            cubes
                .iter()
                .any(|other| cube != other && cube.is_superset_of(other))
        })
        .collect();

    cubes
        .into_iter()
        .zip(dominated)
        .filter_map(|(cube, dominated)| (!dominated).then_some(cube))
        .collect()
}

impl<L: Literal> Hash for Dnf<L> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Combine per-cube hashes multiplicatively: permuted cube sets must
        // collide exactly, and addition loses too much entropy here.
        let mut combined: u64 = 1;
        for cube in &self.cubes {
            let mut hasher = FnvHasher::default();
            cube.hash(&mut hasher);
            // Odd factors keep the running product from collapsing to zero.
            combined = combined.wrapping_mul(hasher.finish() | 1);
        }
        state.write_u64(combined);
    }
}

impl<L: Literal> PartialCompare for Dnf<L> {
    fn compare_partial(&self, other: &Self) -> OrderResult {
        if self == other {
            return OrderResult::Eq;
        }
        if self.is_false() || other.is_trivially_true() {
            return OrderResult::Lt;
        }
        if other.is_false() || self.is_trivially_true() {
            return OrderResult::Gt;
        }

        // `self <= other` when every cube of `self` is subsumed by (is a
        // superset of, or equal to) some cube of `other`. On reduced cube
        // sets mutual subsumption implies equality, which was ruled out
        // above, so at most one direction holds.
        if subsumed_by(&self.cubes, &other.cubes) {
            return OrderResult::Lt;
        }
        if subsumed_by(&other.cubes, &self.cubes) {
            return OrderResult::Gt;
        }
        OrderResult::Incomp
    }
}

fn subsumed_by<L: Literal>(cubes: &[Conjunction<L>], others: &[Conjunction<L>]) -> bool {
    cubes.iter().all(|cube| {
        others
            .iter()
            .any(|other| cube == other || cube.is_superset_of(other))
    })
}

impl<L: Literal + Display> Display for Dnf<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self.cubes.iter().map(|cube| cube.to_string()).collect();
        write!(f, "{{ {} }}", rendered.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use std::hash::Hash;
    use std::hash::Hasher;

    use fnv::FnvHasher;

    use super::super::tests::lit;
    use super::super::tests::TestLit;
    use super::Conjunction;
    use super::Dnf;
    use super::OrderResult;
    use super::PartialCompare;

    fn cube(literals: &[i32]) -> Conjunction<TestLit> {
        Conjunction::from_literals(literals.iter().map(|v| lit(*v)))
    }

    fn dnf(cubes: &[&[i32]]) -> Dnf<TestLit> {
        Dnf::from_cubes(cubes.iter().map(|c| cube(c)))
    }

    #[test]
    fn construction_removes_dominated_cubes() {
        let d = dnf(&[&[1], &[1, 2], &[3]]);
        assert_eq!(d.num_cubes(), 2);
        assert!(d.cubes().contains(&cube(&[1])));
        assert!(d.cubes().contains(&cube(&[3])));
    }

    #[test]
    fn construction_removes_false_and_duplicate_cubes() {
        let d = Dnf::from_cubes([cube(&[1]), cube(&[1]), Conjunction::bot()]);
        assert_eq!(d.num_cubes(), 1);
    }

    #[test]
    fn reduce_is_idempotent() {
        let d = dnf(&[&[1, 2], &[2], &[1, 3]]);
        let again = Dnf::from_cubes(d.cubes().to_vec());
        assert_eq!(d, again);
    }

    #[test]
    fn lattice_identities() {
        let d = dnf(&[&[1], &[2, 3]]);

        assert_eq!(d.or(&Dnf::bot()), d);
        assert_eq!(d.and(&Dnf::top()), d);
        assert!(d.or(&Dnf::top()).is_trivially_true());
        assert!(d.and(&Dnf::bot()).is_false());
    }

    #[test]
    fn and_distributes_over_cubes() {
        let left = dnf(&[&[1], &[2]]);
        let right = dnf(&[&[3]]);
        assert_eq!(left.and(&right), dnf(&[&[1, 3], &[2, 3]]));
    }

    #[test]
    fn partial_order_is_consistent_with_cube_set_inclusion() {
        let small = dnf(&[&[1]]);
        let large = dnf(&[&[1], &[2]]);

        assert_eq!(small.compare_partial(&large), OrderResult::Lt);
        assert_eq!(large.compare_partial(&small), OrderResult::Gt);
        assert_eq!(small.compare_partial(&small.clone()), OrderResult::Eq);
        assert_eq!(
            Dnf::<TestLit>::bot().compare_partial(&small),
            OrderResult::Lt
        );
        assert_eq!(small.compare_partial(&Dnf::top()), OrderResult::Lt);
    }

    #[test]
    fn stronger_cubes_compare_below() {
        let strong = dnf(&[&[1, 2]]);
        let weak = dnf(&[&[1]]);
        assert_eq!(strong.compare_partial(&weak), OrderResult::Lt);
        assert_eq!(weak.compare_partial(&strong), OrderResult::Gt);
    }

    #[test]
    fn hash_ignores_cube_order() {
        let forward = dnf(&[&[1], &[2]]);
        let backward = dnf(&[&[2], &[1]]);

        let mut h1 = FnvHasher::default();
        forward.hash(&mut h1);
        let mut h2 = FnvHasher::default();
        backward.hash(&mut h2);

        assert_eq!(forward, backward);
        assert_eq!(h1.finish(), h2.finish());
    }

    #[test]
    fn remove_drops_exact_cubes_only() {
        let d = dnf(&[&[1], &[2]]);
        let removed = d.remove(&[cube(&[1])]);
        assert_eq!(removed, dnf(&[&[2]]));
        assert_eq!(d.remove(&[cube(&[7])]), d);
    }

    #[test]
    fn resolvent_closure_reaches_fixed_point() {
        // (1 & 2) | (-1 & 2) resolves to 2, which dominates both inputs.
        let d = dnf(&[&[1, 2], &[-1, 2]]);
        let closed = d.compute_all_resolvents();
        assert_eq!(closed, dnf(&[&[2]]));
    }
}
