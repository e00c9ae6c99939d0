//! Periodic maintenance of the mapping store.
//!
//! - `TopicReconciler` probes every paired forum topic and removes the
//!   pairings of topics deleted on the forum side.
//! - `OrphanSweeper` deletes message pairings left behind by a partial
//!   reconcile cascade.
//! - `DisplayNameResync` keeps topic titles in line with peer display names.
//!
//! None of these propagate errors: a tick logs what went wrong and returns a
//! report.

pub mod names;
pub mod sweeper;
pub mod topics;

pub use names::DisplayNameResync;
pub use sweeper::{OrphanSweeper, SweepReport};
pub use topics::{ReconcileReport, TopicReconciler};

use serde::Serialize;

use topicbridge_core::{ChatThreadPair, GroupId};

use crate::platform::QueuedPeer;

/// Refreshes the peer contact list before a reconcile tick.
pub trait ContactSync: Send + Sync {
    /// Returns the number of contacts known after the refresh.
    fn sync_contacts(&self) -> anyhow::Result<usize>;
}

impl ContactSync for QueuedPeer {
    fn sync_contacts(&self) -> anyhow::Result<usize> {
        Ok(QueuedPeer::sync_contacts(self)?)
    }
}

/// Brings forum topic titles in line with the peer side.
pub trait TopicNameSync: Send + Sync {
    fn resync(&self, group: GroupId, pairs: &[ChatThreadPair]) -> anyhow::Result<ResyncReport>;
}

/// Result of one name resync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResyncReport {
    /// Pairings looked at.
    pub checked: usize,
    /// Topics whose title was edited.
    pub renamed: usize,
    /// Pairings whose lookup or edit failed.
    pub failed: usize,
}
