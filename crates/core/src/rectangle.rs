//! Axis-aligned regions of an N-dimensional index lattice.

use alloc::vec;
use alloc::vec::Vec;

/// Region `[origin, origin + shape)` of an N-dimensional index space.
///
/// The empty rectangle (no shape, or a shape of all zeros) is the identity of
/// [`union`](Self::union).
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Rectangle {
    pub origin: Vec<usize>,
    pub shape: Vec<usize>,
}

impl Rectangle {
    #[must_use]
    pub const fn new(origin: Vec<usize>, shape: Vec<usize>) -> Self {
        Self { origin, shape }
    }

    /// The empty rectangle.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            origin: Vec::new(),
            shape: Vec::new(),
        }
    }

    /// The rectangle covering a whole array of the given shape.
    #[must_use]
    pub fn whole(shape: &[usize]) -> Self {
        Self {
            origin: vec![0; shape.len()],
            shape: shape.to_vec(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shape.iter().all(|extent| *extent == 0)
    }

    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Exclusive upper corner, saturating at `usize::MAX`.
    #[must_use]
    pub fn upper(&self) -> Vec<usize> {
        self.origin
            .iter()
            .zip(&self.shape)
            .map(|(o, s)| o.saturating_add(*s))
            .collect()
    }

    /// Returns `true` if both rectangles share at least one index.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        if self.is_empty() || other.is_empty() || self.rank() != other.rank() {
            return false;
        }
        self.origin
            .iter()
            .zip(&self.shape)
            .zip(other.origin.iter().zip(&other.shape))
            .all(|((o1, s1), (o2, s2))| {
                *o1 < o2.saturating_add(*s2) && *o2 < o1.saturating_add(*s1)
            })
    }

    /// Returns `true` if `other` lies entirely inside this rectangle.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        if other.is_empty() {
            return true;
        }
        if self.is_empty() || self.rank() != other.rank() {
            return false;
        }
        let (upper, other_upper) = (self.upper(), other.upper());
        self.origin
            .iter()
            .zip(&other.origin)
            .zip(upper.iter().zip(&other_upper))
            .all(|((o1, o2), (u1, u2))| o1 <= o2 && u2 <= u1)
    }

    /// Minimal rectangle covering both operands.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        let (upper, other_upper) = (self.upper(), other.upper());
        let origin: Vec<usize> = self
            .origin
            .iter()
            .zip(&other.origin)
            .map(|(a, b)| *a.min(b))
            .collect();
        let shape = upper
            .iter()
            .zip(&other_upper)
            .zip(&origin)
            .map(|((a, b), o)| *a.max(b) - o)
            .collect();
        Self { origin, shape }
    }
}
