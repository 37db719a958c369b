//! Quantifier bounds: a non-negative count that may be infinite.

use std::cmp::Ordering;
use std::fmt;

/// A repetition count or a length bound.
///
/// `Infinite` absorbs in addition and multiplication and is larger than
/// every finite value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bound {
    Finite(usize),
    Infinite,
}

impl Bound {
    pub const ZERO: Bound = Bound::Finite(0);
    pub const ONE: Bound = Bound::Finite(1);

    pub fn is_finite(self) -> bool {
        matches!(self, Bound::Finite(_))
    }

    /// The finite value, or `usize::MAX` for infinity.
    pub fn value(self) -> usize {
        match self {
            Bound::Finite(n) => n,
            Bound::Infinite => usize::MAX,
        }
    }

    pub fn add(self, other: Bound) -> Bound {
        match (self, other) {
            (Bound::Finite(a), Bound::Finite(b)) => Bound::Finite(a.saturating_add(b)),
            _ => Bound::Infinite,
        }
    }

    /// Multiplication; infinity wins even against zero, matching how an
    /// unbounded repetition of an empty body is still reported as unbounded.
    pub fn mul(self, other: Bound) -> Bound {
        match (self, other) {
            (Bound::Finite(a), Bound::Finite(b)) => Bound::Finite(a.saturating_mul(b)),
            _ => Bound::Infinite,
        }
    }

    pub fn min(self, other: Bound) -> Bound {
        if self <= other { self } else { other }
    }

    pub fn max(self, other: Bound) -> Bound {
        if self >= other { self } else { other }
    }

    pub fn inc(self) -> Bound {
        match self {
            Bound::Finite(n) => Bound::Finite(n.saturating_add(1)),
            Bound::Infinite => Bound::Infinite,
        }
    }

    pub fn dec(self) -> Bound {
        match self {
            Bound::Finite(n) => Bound::Finite(n.saturating_sub(1)),
            Bound::Infinite => Bound::Infinite,
        }
    }

    /// True when `n` is within `0..=self`.
    pub fn admits(self, n: usize) -> bool {
        match self {
            Bound::Finite(m) => n <= m,
            Bound::Infinite => true,
        }
    }
}

impl PartialOrd for Bound {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Bound {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Bound::Finite(a), Bound::Finite(b)) => a.cmp(b),
            (Bound::Finite(_), Bound::Infinite) => Ordering::Less,
            (Bound::Infinite, Bound::Finite(_)) => Ordering::Greater,
            (Bound::Infinite, Bound::Infinite) => Ordering::Equal,
        }
    }
}

impl From<usize> for Bound {
    fn from(n: usize) -> Self {
        Bound::Finite(n)
    }
}

/// Infinity is rendered as the empty string so that `{2,}` round-trips.
impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Finite(n) => write!(f, "{n}"),
            Bound::Infinite => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infinity_absorbs_addition() {
        assert_eq!(Bound::Finite(3).add(Bound::Infinite), Bound::Infinite);
        assert_eq!(Bound::Finite(3).add(Bound::Finite(4)), Bound::Finite(7));
    }

    #[test]
    fn infinity_absorbs_multiplication() {
        assert_eq!(Bound::ZERO.mul(Bound::Infinite), Bound::Infinite);
        assert_eq!(Bound::Finite(2).mul(Bound::Finite(5)), Bound::Finite(10));
    }

    #[test]
    fn infinity_is_top() {
        assert!(Bound::Finite(usize::MAX) < Bound::Infinite);
        assert_eq!(Bound::Finite(1).max(Bound::Infinite), Bound::Infinite);
        assert_eq!(Bound::Finite(1).min(Bound::Infinite), Bound::Finite(1));
    }

    #[test]
    fn increment_and_decrement() {
        assert_eq!(Bound::ZERO.inc(), Bound::ONE);
        assert_eq!(Bound::ZERO.dec(), Bound::ZERO);
        assert_eq!(Bound::Infinite.dec(), Bound::Infinite);
    }

    #[test]
    fn display_hides_infinity() {
        assert_eq!(Bound::Finite(12).to_string(), "12");
        assert_eq!(Bound::Infinite.to_string(), "");
    }
}
