//! Named, shared, growable index spaces.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::ops::Deref;

/// A `(name, length)` pair. Variables depending on the same name share it.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dimension {
    pub name: String,
    pub length: usize,
}

impl Dimension {
    #[must_use]
    pub fn new(name: impl Into<String>, length: usize) -> Self {
        Self {
            name: name.into(),
            length,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.length)
    }
}

/// Ordered, immutable list of dimensions.
///
/// Used both for the dimensions of a single variable (ordered by axis) and
/// for the resolved dimensions of a whole dataset.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct DimensionList(Vec<Dimension>);

impl DimensionList {
    #[must_use]
    pub const fn new(dimensions: Vec<Dimension>) -> Self {
        Self(dimensions)
    }

    /// Dimensions with the given names and zero length.
    #[must_use]
    pub fn zero_length<S: AsRef<str>>(names: &[S]) -> Self {
        Self(
            names
                .iter()
                .map(|name| Dimension::new(name.as_ref(), 0))
                .collect(),
        )
    }

    /// Looks a dimension up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Dimension> {
        self.0.iter().find(|d| d.name == name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Lengths in axis order.
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        self.0.iter().map(|d| d.length).collect()
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|d| d.name.as_str()).collect()
    }

    /// Same names, new lengths. `shape` must have one entry per dimension.
    #[must_use]
    pub fn with_shape(&self, shape: &[usize]) -> Self {
        debug_assert_eq!(self.0.len(), shape.len());
        Self(
            self.0
                .iter()
                .zip(shape)
                .map(|(d, length)| Dimension::new(d.name.clone(), *length))
                .collect(),
        )
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<Dimension> {
        self.0
    }
}

impl Deref for DimensionList {
    type Target = [Dimension];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Dimension>> for DimensionList {
    fn from(dimensions: Vec<Dimension>) -> Self {
        Self(dimensions)
    }
}

impl FromIterator<Dimension> for DimensionList {
    fn from_iter<I: IntoIterator<Item = Dimension>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for DimensionList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_and_shape() {
        let dims = DimensionList::new(vec![Dimension::new("t", 4), Dimension::new("x", 2)]);
        assert_eq!(dims.shape(), vec![4, 2]);
        assert_eq!(dims.get("x").map(|d| d.length), Some(2));
        assert!(!dims.contains("y"));
        assert_eq!(dims.with_shape(&[5, 2]).shape(), vec![5, 2]);
        assert_eq!(dims.to_string(), "(t:4, x:2)");
    }
}
