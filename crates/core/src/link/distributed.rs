//! Commit and rollback across linked datasets.
//!
//! The participants of a commit are the datasets reachable from the
//! initiator through *active* links, links with pending changes at either
//! end. Locks are taken one dataset at a time and never nested, so two
//! closures committing concurrently cannot deadlock; the price is that a
//! failure in the final phase cannot be compensated.

use alloc::boxed::Box;
use alloc::vec::Vec;

use hashbrown::HashSet;

use super::{DataSetLink, LinkEndpoint};
use crate::dataset::{DataSet, DataSetChangeset};
use crate::error::{Error, Result};

/// Restores every dataset's autocommit flag when dropped.
#[must_use]
pub(crate) struct AutocommitSuspension {
    restore: Vec<(DataSet, bool)>,
}

impl AutocommitSuspension {
    fn suspend(datasets: &[DataSet]) -> Self {
        let restore = datasets
            .iter()
            .map(|dataset| (dataset.clone(), dataset.replace_autocommit(false)))
            .collect();
        Self { restore }
    }
}

impl Drop for AutocommitSuspension {
    fn drop(&mut self) {
        for (dataset, enabled) in self.restore.drain(..) {
            dataset.replace_autocommit(enabled);
        }
    }
}

fn endpoint_has_changes(endpoint: &LinkEndpoint) -> bool {
    endpoint
        .dataset
        .upgrade()
        .is_some_and(|dataset| dataset.variable_has_changes(endpoint.variable))
}

fn is_active(link: &DataSetLink) -> bool {
    endpoint_has_changes(&link.reference) || endpoint_has_changes(&link.target)
}

/// Breadth-first walk of the link graph from `start`; `start` comes first.
/// Disposed datasets are not participants.
pub(crate) fn closure(start: &DataSet, active_only: bool) -> Vec<DataSet> {
    let mut order = alloc::vec![start.clone()];
    let mut seen: HashSet<_> = [start.id()].into_iter().collect();
    let mut next = 0;
    while let Some(dataset) = order.get(next).cloned() {
        next += 1;
        for link in dataset.links() {
            if active_only && !is_active(&link) {
                continue;
            }
            for endpoint in [&link.reference, &link.target] {
                if seen.contains(&endpoint.dataset_id) {
                    continue;
                }
                seen.insert(endpoint.dataset_id);
                if let Some(other) = endpoint.dataset.upgrade().filter(|d| !d.is_disposed()) {
                    order.push(other);
                }
            }
        }
    }
    order
}

/// Participants of a commit or rollback started at `start`, with autocommit
/// suspended on the whole connected component until the guard drops.
pub(crate) fn active_closure(start: &DataSet) -> (Vec<DataSet>, AutocommitSuspension) {
    let suspension = AutocommitSuspension::suspend(&closure(start, false));
    let participants = closure(start, true);
    if participants.len() > 1 {
        tracing::debug!(
            dataset = %start.id(),
            participants = participants.len(),
            "linked datasets join the transaction"
        );
    }
    (participants, suspension)
}

/// Commits every participant; `closure[0]` is the initiator.
///
/// Phases:
/// 0. references pick up their targets' proposed dimensions;
/// 1. each dataset precommits, and on the first failure the ones already
///    precommitted are undone;
/// 2. each dataset final-commits, a failure here is not compensated;
/// 3. `Committed` fires on every participant but the initiator, whose
///    changeset is returned for the caller to publish.
pub(crate) fn commit(closure: &[DataSet]) -> Result<Option<DataSetChangeset>> {
    for dataset in closure {
        dataset.sync_references();
    }

    let mut outputs = Vec::with_capacity(closure.len());
    for (index, dataset) in closure.iter().enumerate() {
        match dataset.precommit_pending() {
            Ok(output) => outputs.push(output),
            Err(source) => {
                tracing::debug!(
                    dataset = %dataset.id(),
                    error = %source,
                    undone = index,
                    "distributed precommit failed"
                );
                for done in &closure[..index] {
                    done.undo_precommit();
                }
                return Err(Error::DistributedCommitFailed {
                    dataset: dataset.id(),
                    source: Box::new(source),
                });
            }
        }
    }

    let mut changesets = Vec::with_capacity(closure.len());
    for (dataset, output) in closure.iter().zip(outputs) {
        let Some(output) = output else {
            changesets.push(None);
            continue;
        };
        match dataset.final_commit(output) {
            Ok(changeset) => changesets.push(Some(changeset)),
            Err(source) => {
                tracing::error!(
                    dataset = %dataset.id(),
                    error = %source,
                    committed = changesets.len(),
                    "final commit failed; linked datasets may be inconsistent"
                );
                return Err(Error::DistributedCommitFailed {
                    dataset: dataset.id(),
                    source: Box::new(source),
                });
            }
        }
    }

    let mut changesets = changesets.into_iter();
    let initiator = changesets.next().flatten();
    for (dataset, changeset) in closure.iter().skip(1).zip(changesets) {
        if let Some(changeset) = changeset {
            dataset.publish_commit(changeset);
        }
    }
    Ok(initiator)
}
