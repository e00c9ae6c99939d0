//! Topic reconciler: detects forum topics deleted out-of-band.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use topicbridge_core::{ChatThreadPair, GroupId, ProbeOutcome};

use crate::platform::QueuedForum;
use crate::store::MappingStore;

use super::{ContactSync, ResyncReport, TopicNameSync};

/// Summary of one reconcile tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub group: GroupId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Contact count after the preliminary sync, `None` if it failed or is not wired.
    pub contacts: Option<usize>,
    /// Pairings read from the store.
    pub pairs: usize,
    /// Pairings on the default topic, never probed.
    pub skipped: usize,
    pub probed: usize,
    /// Probes answered with "not modified".
    pub unchanged: usize,
    /// Pairings dropped because their topic is gone.
    pub removed: usize,
    pub message_pairs_deleted: u64,
    /// Store deletes that failed; left for the orphan sweep.
    pub store_failures: usize,
    /// The pairing set could not be read.
    pub aborted: bool,
    pub resync: Option<ResyncReport>,
}

impl ReconcileReport {
    fn begin(group: GroupId) -> Self {
        let now = Utc::now();
        Self {
            group,
            started_at: now,
            finished_at: now,
            contacts: None,
            pairs: 0,
            skipped: 0,
            probed: 0,
            unchanged: 0,
            removed: 0,
            message_pairs_deleted: 0,
            store_failures: 0,
            aborted: false,
            resync: None,
        }
    }

    fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }
}

/// Probes every paired topic of one forum group through the forum queue.
pub struct TopicReconciler {
    group: GroupId,
    store: Arc<dyn MappingStore>,
    forum: QueuedForum,
    contacts: Option<Arc<dyn ContactSync>>,
    names: Option<Arc<dyn TopicNameSync>>,
}

impl TopicReconciler {
    pub fn new(group: GroupId, store: Arc<dyn MappingStore>, forum: QueuedForum) -> Self {
        Self {
            group,
            store,
            forum,
            contacts: None,
            names: None,
        }
    }

    /// Refresh contacts at the start of every tick.
    pub fn with_contact_sync(mut self, contacts: Arc<dyn ContactSync>) -> Self {
        self.contacts = Some(contacts);
        self
    }

    /// Resync topic titles when a probe reports "not modified".
    pub fn with_name_sync(mut self, names: Arc<dyn TopicNameSync>) -> Self {
        self.names = Some(names);
        self
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    /// Run one reconcile pass over the group's pairings.
    pub fn run_tick(&self) -> ReconcileReport {
        let mut report = ReconcileReport::begin(self.group);

        if let Some(contacts) = &self.contacts {
            match contacts.sync_contacts() {
                Ok(count) => {
                    debug!(contacts = count, "peer contacts synced");
                    report.contacts = Some(count);
                }
                Err(e) => warn!(error = %e, "peer contact sync failed; continuing"),
            }
        }

        let pairs = match self.store.chat_thread_pairs(self.group) {
            Ok(pairs) => pairs,
            Err(e) => {
                error!(group_id = %self.group, error = %e, "failed to read chat_thread_pairs");
                report.aborted = true;
                return report.finish();
            }
        };
        report.pairs = pairs.len();

        let mut surviving = Vec::with_capacity(pairs.len());
        let mut needs_resync = false;

        for pair in pairs {
            if !pair.is_probeable() {
                report.skipped += 1;
                continue;
            }

            report.probed += 1;
            let probe = self.forum.reopen_topic(pair.tg_chat_id, pair.tg_thread_id);
            let outcome = ProbeOutcome::classify(&probe);

            match (outcome, &probe) {
                (ProbeOutcome::NotFound, _) => {
                    info!(
                        group_id = %pair.tg_chat_id,
                        thread_id = %pair.tg_thread_id,
                        chat_id = %pair.chat_id,
                        "forum topic deleted, removing pairing"
                    );
                    if self.remove(&pair, &mut report) {
                        report.removed += 1;
                        continue;
                    }
                }
                (ProbeOutcome::Unchanged, _) => {
                    report.unchanged += 1;
                    needs_resync = true;
                }
                (ProbeOutcome::Exists, Err(e)) => {
                    warn!(
                        thread_id = %pair.tg_thread_id,
                        error = %e,
                        "topic probe failed ambiguously; keeping pairing"
                    );
                }
                (ProbeOutcome::Exists, Ok(())) => {}
            }
            surviving.push(pair);
        }

        if needs_resync {
            if let Some(names) = &self.names {
                match names.resync(self.group, &surviving) {
                    Ok(resync) => report.resync = Some(resync),
                    Err(e) => warn!(group_id = %self.group, error = %e, "topic name resync failed"),
                }
            }
        }

        let report = report.finish();
        info!(
            group_id = %report.group,
            probed = report.probed,
            skipped = report.skipped,
            removed = report.removed,
            store_failures = report.store_failures,
            "topic reconcile tick finished"
        );
        report
    }

    /// Cascade delete for a vanished topic. Both statements are attempted;
    /// returns whether the pairing itself is gone.
    fn remove(&self, pair: &ChatThreadPair, report: &mut ReconcileReport) -> bool {
        let (group, thread) = pair.topic();

        match self.store.delete_message_pairs_by_thread(group, thread) {
            Ok(rows) => {
                debug!(thread_id = %thread, rows_affected = rows, "deleted msg_id_pairs");
                report.message_pairs_deleted += rows;
            }
            Err(e) => {
                error!(thread_id = %thread, error = %e, "failed to delete msg_id_pairs for deleted topic");
                report.store_failures += 1;
            }
        }

        match self.store.drop_chat_thread_pair(group, thread) {
            Ok(()) => true,
            Err(e) => {
                error!(thread_id = %thread, error = %e, "failed to delete chat_thread_pairs for deleted topic");
                report.store_failures += 1;
                false
            }
        }
    }
}
