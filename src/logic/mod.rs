//! The literal algebra: conjunctions of literals, minimal disjunctive normal
//! forms over them, and the resolution rule that ties the two together.

mod conjunction;
mod dnf;
mod literal;

pub use conjunction::Conjunction;
pub use dnf::Dnf;
pub use literal::Literal;

/// Outcome of comparing two elements of a partial order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderResult {
    Lt,
    Gt,
    Eq,
    /// The elements are incomparable.
    Incomp,
}

/// A partial order; unlike [`PartialOrd`] the incomparable case is an explicit
/// variant rather than `None`, which keeps match arms exhaustive at call sites.
pub trait PartialCompare {
    fn compare_partial(&self, other: &Self) -> OrderResult;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::Literal;

    /// Integer literal whose opposite is its negation; zero is not a literal.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub(crate) struct TestLit(i32);

    impl Literal for TestLit {
        fn opposite(&self) -> Option<Self> {
            Some(TestLit(-self.0))
        }
    }

    pub(crate) fn lit(value: i32) -> TestLit {
        assert_ne!(value, 0);
        TestLit(value)
    }
}
