//! Per-entity key/value metadata with a committed state and a proposed overlay.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use chrono::NaiveDateTime;
use derive_more::From;

use crate::schema::SchemaVersion;

/// Metadata key holding an entity's display name.
pub const KEY_NAME: &str = "Name";

#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, From)]
pub enum MetadataValue {
    Int(i64),
    Double(f64),
    Bool(bool),
    String(String),
    DateTime(NaiveDateTime),
    Doubles(Vec<f64>),
    Strings(Vec<String>),
}

impl MetadataValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

/// Committed entries plus the entries proposed by the open transaction.
///
/// Writes only ever touch the proposed overlay; [`commit`](Self::commit)
/// folds it into the committed entries and [`rollback`](Self::rollback)
/// discards it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MetadataDictionary {
    committed: BTreeMap<String, MetadataValue>,
    proposed: BTreeMap<String, MetadataValue>,
}

impl MetadataDictionary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks a key up in the requested state.
    #[must_use]
    pub fn get(&self, key: &str, version: SchemaVersion) -> Option<&MetadataValue> {
        match version {
            SchemaVersion::Committed => self.committed.get(key),
            SchemaVersion::Proposed | SchemaVersion::Recent => self
                .proposed
                .get(key)
                .or_else(|| self.committed.get(key)),
        }
    }

    /// Proposes a new value for `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        self.proposed.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.proposed.is_empty()
    }

    /// Entries proposed by the open transaction.
    #[must_use]
    pub const fn changes(&self) -> &BTreeMap<String, MetadataValue> {
        &self.proposed
    }

    /// Full view of the dictionary in the requested state.
    #[must_use]
    pub fn entries(&self, version: SchemaVersion) -> BTreeMap<String, MetadataValue> {
        let mut out = self.committed.clone();
        if !matches!(version, SchemaVersion::Committed) {
            out.extend(self.proposed.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        out
    }

    pub fn commit(&mut self) {
        let proposed = core::mem::take(&mut self.proposed);
        self.committed.extend(proposed);
    }

    pub fn rollback(&mut self) {
        self.proposed.clear();
    }
}
