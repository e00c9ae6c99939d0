//! Persisted chat↔topic and message-id mappings.
//!
//! The bridge only depends on the query contract below. Reconciliation and
//! sweeping read pairings and issue deletes; application code saves and
//! looks up rows while relaying messages.

pub mod memory;
pub mod postgres;

#[cfg(test)]
pub(crate) mod flaky;

pub use memory::InMemoryMappingStore;
pub use postgres::PostgresMappingStore;

use topicbridge_core::{ChatThreadPair, GroupId, MessageIdPair, PeerChatId, ThreadId};

/// Mapping store error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Query contract of the mapping store.
///
/// Every method is a single statement; callers get no transaction spanning
/// two calls.
pub trait MappingStore: Send + Sync {
    /// All pairings of a forum group.
    fn chat_thread_pairs(&self, group: GroupId) -> Result<Vec<ChatThreadPair>, StoreError>;

    /// Insert a pairing, or move an existing peer chat to a new topic.
    fn save_chat_thread_pair(&self, pair: &ChatThreadPair) -> Result<(), StoreError>;

    fn thread_for_chat(
        &self,
        group: GroupId,
        chat: &PeerChatId,
    ) -> Result<Option<ThreadId>, StoreError>;

    /// Remove the pairing of a topic. Removing a missing pairing is not an error.
    fn drop_chat_thread_pair(&self, group: GroupId, thread: ThreadId) -> Result<(), StoreError>;

    /// Insert a message pairing, replacing an earlier one for the same peer message.
    fn save_message_pair(&self, pair: &MessageIdPair) -> Result<(), StoreError>;

    fn message_pairs_by_thread(
        &self,
        group: GroupId,
        thread: ThreadId,
    ) -> Result<Vec<MessageIdPair>, StoreError>;

    /// Delete every message pairing of a topic; returns rows affected.
    fn delete_message_pairs_by_thread(
        &self,
        group: GroupId,
        thread: ThreadId,
    ) -> Result<u64, StoreError>;

    /// Delete message pairings whose `(group, thread)` has no chat pairing;
    /// returns rows affected.
    fn sweep_orphan_message_pairs(&self) -> Result<u64, StoreError>;
}
