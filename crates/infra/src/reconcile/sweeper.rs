//! Orphan sweeper: repairs message pairings whose topic pairing is gone.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::store::MappingStore;

/// Result of one sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub swept_at: DateTime<Utc>,
    /// Rows deleted; `None` when the sweep failed.
    pub rows_affected: Option<u64>,
}

impl SweepReport {
    pub fn succeeded(&self) -> bool {
        self.rows_affected.is_some()
    }
}

/// Deletes message pairings with no matching `(group, thread)` pairing.
///
/// Running it twice without an intervening change deletes nothing the
/// second time.
pub struct OrphanSweeper {
    store: Arc<dyn MappingStore>,
}

impl OrphanSweeper {
    pub fn new(store: Arc<dyn MappingStore>) -> Self {
        Self { store }
    }

    pub fn run(&self) -> SweepReport {
        let rows_affected = match self.store.sweep_orphan_message_pairs() {
            Ok(rows) => {
                info!(rows_affected = rows, "cleaned up orphaned msg_id_pairs");
                Some(rows)
            }
            Err(e) => {
                error!(error = %e, "failed to clean up orphaned msg_id_pairs");
                None
            }
        };
        SweepReport {
            swept_at: Utc::now(),
            rows_affected,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use topicbridge_core::{ChatThreadPair, GroupId, MessageIdPair, PeerChatId, ThreadId};

    use super::*;
    use crate::store::flaky::FlakyStore;

    fn message(group: i64, thread: i64, peer_id: &str) -> MessageIdPair {
        MessageIdPair {
            tg_chat_id: GroupId::new(group),
            tg_thread_id: ThreadId::new(thread),
            peer_chat_id: PeerChatId::parse("C1").unwrap(),
            peer_message_id: peer_id.to_string(),
            tg_message_id: 1,
        }
    }

    #[test]
    fn second_sweep_deletes_nothing() {
        let store = Arc::new(FlakyStore::default());
        store
            .inner
            .save_chat_thread_pair(&ChatThreadPair::new(
                PeerChatId::parse("C1").unwrap(),
                GroupId::new(100),
                ThreadId::new(50),
            ))
            .unwrap();
        store.inner.save_message_pair(&message(100, 50, "kept")).unwrap();
        store.inner.save_message_pair(&message(100, 51, "orphan-a")).unwrap();
        store.inner.save_message_pair(&message(100, 52, "orphan-b")).unwrap();

        let sweeper = OrphanSweeper::new(store.clone());
        assert_eq!(sweeper.run().rows_affected, Some(2));
        assert_eq!(sweeper.run().rows_affected, Some(0));
        assert_eq!(store.inner.message_pair_count(), 1);
    }

    #[test]
    fn failure_is_reported_not_propagated() {
        let store = Arc::new(FlakyStore::default());
        store.fail_sweep.store(true, Ordering::SeqCst);

        let report = OrphanSweeper::new(store).run();
        assert!(!report.succeeded());
    }
}
