use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use uuid::Uuid;

use crate::data::DataType;
use crate::variable::VariableId;

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors raised by dataset, variable and storage operations.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A shared-dimension or coordinate-system rule is violated by the
    /// proposed state. The dataset keeps its pending changes.
    #[error(transparent)]
    ConstraintsFailed(#[from] ConstraintsFailed),

    /// One dataset of a linked closure failed during distributed commit.
    #[error("distributed commit failed at dataset {dataset}: {source}")]
    DistributedCommitFailed { dataset: Uuid, source: Box<Error> },

    /// A `Changing` or `Committing` subscriber vetoed the operation.
    #[error("cannot perform action: {0}")]
    CannotPerformAction(String),

    #[error("dataset is read only")]
    ReadOnly,

    #[error("dataset is disposed")]
    Disposed,

    /// Malformed origin, shape or dimension argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("type mismatch: expected {expected}, found {actual}")]
    TypeMismatch { expected: DataType, actual: DataType },

    #[error("variable {0} not found")]
    VariableNotFound(VariableId),

    /// A link or reference points at a dataset that has been dropped.
    #[error("linked dataset has been released")]
    DataSetReleased,

    /// The dataset committed while a multiple-data read was in progress.
    #[error("dataset version changed during read: expected {expected}, found {actual}")]
    VersionChanged { expected: u64, actual: u64 },

    #[error("storage failure: {0}")]
    Storage(String),
}

impl Error {
    /// Returns the constraint failure carried by this error, looking through
    /// a distributed commit wrapper.
    #[must_use]
    pub fn as_constraints_failed(&self) -> Option<&ConstraintsFailed> {
        match self {
            Self::ConstraintsFailed(inner) => Some(inner),
            Self::DistributedCommitFailed { source, .. } => source.as_constraints_failed(),
            _ => None,
        }
    }
}

/// The proposed state of a dataset violates its constraints.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintsFailed {
    /// Names of shared dimensions reported with different lengths.
    pub dimensions: Vec<String>,
    pub message: String,
}

impl ConstraintsFailed {
    /// Builds the failure for a set of conflicting shared dimensions.
    #[must_use]
    pub fn conflicting_dimensions(dimensions: Vec<String>) -> Self {
        let message = if let [single] = dimensions.as_slice() {
            alloc::format!("shared dimension {single} has different lengths in different variables")
        } else {
            alloc::format!(
                "shared dimensions {} have different lengths in different variables",
                dimensions.join(", ")
            )
        };
        Self {
            dimensions,
            message,
        }
    }

    /// Builds a failure for a rule that is not about shared dimensions.
    #[must_use]
    pub fn rule(message: impl Into<String>) -> Self {
        Self {
            dimensions: Vec::new(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConstraintsFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "constraints failed: {}", self.message)
    }
}

impl core::error::Error for ConstraintsFailed {}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;
    use alloc::vec;

    use super::*;

    #[test]
    fn singular_and_plural_wording() {
        let one = ConstraintsFailed::conflicting_dimensions(vec!["x".to_string()]);
        assert!(one.message.starts_with("shared dimension x has"));

        let many = ConstraintsFailed::conflicting_dimensions(vec![
            "x".to_string(),
            "y".to_string(),
            "z".to_string(),
        ]);
        assert!(many.message.starts_with("shared dimensions x, y, z have"));
    }

    #[test]
    fn constraints_failure_seen_through_distributed_wrapper() {
        let inner = Error::from(ConstraintsFailed::rule("bad axis"));
        let wrapped = Error::DistributedCommitFailed {
            dataset: Uuid::nil(),
            source: Box::new(inner),
        };
        assert_eq!(
            wrapped.as_constraints_failed().map(|c| c.message.as_str()),
            Some("bad axis")
        );
        assert!(Error::ReadOnly.as_constraints_failed().is_none());
    }
}
