use alloc::string::String;

use typed_builder::TypedBuilder;

/// URI of a dataset that lives only in memory.
pub const MEMORY_URI: &str = "msds:memory";

/// Construction options of a [`DataSet`](super::DataSet).
///
/// ```
/// use sdslite_core::DataSetOptions;
///
/// let options = DataSetOptions::builder().autocommit(true).build();
/// assert_eq!(options.uri, "msds:memory");
/// ```
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, TypedBuilder)]
pub struct DataSetOptions {
    #[builder(default = String::from(MEMORY_URI), setter(into))]
    pub uri: String,
    /// Rejects every mutation, commit and rollback with `Error::ReadOnly`.
    #[builder(default)]
    pub read_only: bool,
    /// Commit after every successful user mutation.
    #[builder(default)]
    pub autocommit: bool,
}

impl Default for DataSetOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}
