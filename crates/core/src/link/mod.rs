//! Cross-dataset references and the graph they form.
//!
//! A link ties a reference variable in one dataset to the variable it
//! mirrors in another. The referencing dataset owns the link and tracks
//! whether it is committed; the target dataset keeps a back-pointer so that
//! changes to the target can be pushed to every reference and so that the
//! link graph can be walked from either end.
//!
//! Endpoints hold weak dataset handles, so linked datasets never keep each
//! other alive.

pub(crate) mod distributed;

use alloc::vec::Vec;

use uuid::Uuid;

use crate::dataset::WeakDataSet;
use crate::variable::VariableId;

/// One end of a link.
#[derive(Debug, Clone)]
pub struct LinkEndpoint {
    pub dataset: WeakDataSet,
    pub dataset_id: Uuid,
    pub variable: VariableId,
}

impl LinkEndpoint {
    fn is(&self, dataset_id: Uuid, variable: VariableId) -> bool {
        self.dataset_id == dataset_id && self.variable == variable
    }
}

/// A reference variable and the variable it mirrors.
#[derive(Debug, Clone)]
pub struct DataSetLink {
    pub reference: LinkEndpoint,
    pub target: LinkEndpoint,
    committed: bool,
}

impl DataSetLink {
    #[must_use]
    pub const fn new(reference: LinkEndpoint, target: LinkEndpoint) -> Self {
        Self {
            reference,
            target,
            committed: false,
        }
    }

    /// Whether the reference variable has been committed in its dataset.
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        self.committed
    }
}

/// Links one dataset participates in.
#[derive(Debug, Default, Clone)]
pub struct DataSetLinkCollection {
    /// Links whose reference variable lives in this dataset.
    outgoing: Vec<DataSetLink>,
    /// Links whose target variable lives in this dataset.
    incoming: Vec<DataSetLink>,
}

impl DataSetLinkCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn outgoing(&self) -> &[DataSetLink] {
        &self.outgoing
    }

    #[must_use]
    pub fn incoming(&self) -> &[DataSetLink] {
        &self.incoming
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outgoing.is_empty() && self.incoming.is_empty()
    }

    pub(crate) fn add_outgoing(&mut self, link: DataSetLink) {
        self.outgoing.push(link);
    }

    pub(crate) fn add_incoming(&mut self, link: DataSetLink) {
        self.incoming.push(link);
    }

    /// Reference endpoints mirroring `variable` of this dataset.
    #[must_use]
    pub fn references_to(&self, variable: VariableId) -> Vec<LinkEndpoint> {
        self.incoming
            .iter()
            .filter(|link| link.target.variable == variable)
            .map(|link| link.reference.clone())
            .collect()
    }

    /// Every link touching this dataset, outgoing first.
    pub fn iter(&self) -> impl Iterator<Item = &DataSetLink> {
        self.outgoing.iter().chain(&self.incoming)
    }

    pub(crate) fn commit_outgoing(&mut self) {
        for link in &mut self.outgoing {
            link.committed = true;
        }
    }

    /// Detaches links created by the open transaction.
    pub(crate) fn remove_uncommitted_outgoing(&mut self) -> Vec<DataSetLink> {
        let (uncommitted, committed) = core::mem::take(&mut self.outgoing)
            .into_iter()
            .partition(|link| !link.committed);
        self.outgoing = committed;
        uncommitted
    }

    pub(crate) fn remove_outgoing(&mut self, target_dataset: Uuid, target: VariableId) {
        self.outgoing
            .retain(|link| !link.target.is(target_dataset, target));
    }

    /// Removes every link, returning the outgoing and incoming ones.
    pub(crate) fn detach_all(&mut self) -> (Vec<DataSetLink>, Vec<DataSetLink>) {
        (
            core::mem::take(&mut self.outgoing),
            core::mem::take(&mut self.incoming),
        )
    }

    pub(crate) fn remove_incoming(&mut self, reference_dataset: Uuid, reference: VariableId) {
        self.incoming
            .retain(|link| !link.reference.is(reference_dataset, reference));
    }
}
