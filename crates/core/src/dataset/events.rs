//! Subscriptions to dataset lifecycle events.
//!
//! `Changing` and `Committing` subscribers may veto the operation. Handlers
//! run synchronously on the thread performing the operation. `Committing`
//! runs while the dataset is locked and must not call back into it.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use uuid::Uuid;

use super::changes::{DataSetChanges, DataSetChangeset};
use crate::error::{Error, Result};
use crate::schema::DataSetSchema;
use crate::variable::VariableId;

/// A user mutation about to be applied, or just applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeAction {
    AddVariable { name: String },
    AddReference { name: String },
    AddCoordinateSystem { name: String },
    PutData { variable: VariableId },
    Append { variable: VariableId, dimension: usize },
    SetMetadata { variable: VariableId, key: String },
}

#[derive(Debug)]
pub struct ChangingEvent {
    pub dataset: Uuid,
    pub action: ChangeAction,
    cancel: bool,
}

impl ChangingEvent {
    /// Vetoes the mutation; the caller receives [`Error::CannotPerformAction`].
    pub fn cancel(&mut self) {
        self.cancel = true;
    }
}

#[derive(Debug, Clone)]
pub struct ChangedEvent {
    pub dataset: Uuid,
    pub action: ChangeAction,
}

#[derive(Debug)]
pub struct CommittingEvent<'a> {
    pub dataset: Uuid,
    /// Changes about to be committed, appends already rewritten into puts.
    pub changes: &'a DataSetChanges,
    cancel: bool,
}

impl CommittingEvent<'_> {
    pub fn cancel(&mut self) {
        self.cancel = true;
    }
}

#[derive(Debug, Clone)]
pub struct CommittedEvent {
    pub dataset: Uuid,
    pub changeset: DataSetChangeset,
    /// Committed schema captured right after the commit.
    pub schema: Arc<DataSetSchema>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolledBackEvent {
    pub dataset: Uuid,
    /// Version the dataset stays at.
    pub version: u64,
}

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;
type CancellableHandler<E> = Arc<dyn Fn(&mut E) + Send + Sync>;
type CommittingHandler = Arc<dyn for<'a> Fn(&mut CommittingEvent<'a>) + Send + Sync>;

/// Registered handlers. Cloned out of the dataset before dispatch so that
/// handlers run without any dataset lock held, `Committing` excepted.
#[derive(Default, Clone)]
pub(crate) struct EventHandlers {
    changing: Vec<CancellableHandler<ChangingEvent>>,
    changed: Vec<Handler<ChangedEvent>>,
    committing: Vec<CommittingHandler>,
    committed: Vec<Handler<CommittedEvent>>,
    rolled_back: Vec<Handler<RolledBackEvent>>,
}

impl core::fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventHandlers")
            .field("changing", &self.changing.len())
            .field("changed", &self.changed.len())
            .field("committing", &self.committing.len())
            .field("committed", &self.committed.len())
            .field("rolled_back", &self.rolled_back.len())
            .finish()
    }
}

impl EventHandlers {
    pub fn on_changing(&mut self, handler: impl Fn(&mut ChangingEvent) + Send + Sync + 'static) {
        self.changing.push(Arc::new(handler));
    }

    pub fn on_changed(&mut self, handler: impl Fn(&ChangedEvent) + Send + Sync + 'static) {
        self.changed.push(Arc::new(handler));
    }

    pub fn on_committing(
        &mut self,
        handler: impl for<'a> Fn(&mut CommittingEvent<'a>) + Send + Sync + 'static,
    ) {
        self.committing.push(Arc::new(handler));
    }

    pub fn on_committed(&mut self, handler: impl Fn(&CommittedEvent) + Send + Sync + 'static) {
        self.committed.push(Arc::new(handler));
    }

    pub fn on_rolled_back(&mut self, handler: impl Fn(&RolledBackEvent) + Send + Sync + 'static) {
        self.rolled_back.push(Arc::new(handler));
    }

    pub fn changing(&self, dataset: Uuid, action: &ChangeAction) -> Result<()> {
        if self.changing.is_empty() {
            return Ok(());
        }
        let mut event = ChangingEvent {
            dataset,
            action: action.clone(),
            cancel: false,
        };
        for handler in &self.changing {
            handler(&mut event);
        }
        if event.cancel {
            tracing::debug!(%dataset, action = ?event.action, "change cancelled by subscriber");
            return Err(Error::CannotPerformAction(alloc::format!(
                "{:?} cancelled by subscriber",
                event.action
            )));
        }
        Ok(())
    }

    pub fn changed(&self, dataset: Uuid, action: ChangeAction) {
        let event = ChangedEvent { dataset, action };
        for handler in &self.changed {
            handler(&event);
        }
    }

    pub fn committing(&self, dataset: Uuid, changes: &DataSetChanges) -> Result<()> {
        let mut event = CommittingEvent {
            dataset,
            changes,
            cancel: false,
        };
        for handler in &self.committing {
            handler(&mut event);
        }
        if event.cancel {
            tracing::debug!(%dataset, changeset = changes.changeset, "commit cancelled by subscriber");
            return Err(Error::CannotPerformAction(
                "commit cancelled by subscriber".into(),
            ));
        }
        Ok(())
    }

    pub fn committed(&self, event: &CommittedEvent) {
        for handler in &self.committed {
            handler(event);
        }
    }

    pub fn rolled_back(&self, event: &RolledBackEvent) {
        for handler in &self.rolled_back {
            handler(event);
        }
    }
}
