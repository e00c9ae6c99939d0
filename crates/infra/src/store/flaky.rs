//! Mapping store wrapper that fails selected operations on demand.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use topicbridge_core::{ChatThreadPair, GroupId, MessageIdPair, PeerChatId, ThreadId};

use super::{InMemoryMappingStore, MappingStore, StoreError};

#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: InMemoryMappingStore,
    pub fail_list: AtomicBool,
    pub fail_message_delete: AtomicBool,
    pub fail_pair_drop: AtomicBool,
    pub fail_sweep: AtomicBool,
    /// Number of mutating calls that reached the store.
    pub mutations: AtomicUsize,
}

impl FlakyStore {
    fn check(flag: &AtomicBool, op: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Storage(format!("injected {op} failure")))
        } else {
            Ok(())
        }
    }
}

impl MappingStore for FlakyStore {
    fn chat_thread_pairs(&self, group: GroupId) -> Result<Vec<ChatThreadPair>, StoreError> {
        Self::check(&self.fail_list, "list")?;
        self.inner.chat_thread_pairs(group)
    }

    fn save_chat_thread_pair(&self, pair: &ChatThreadPair) -> Result<(), StoreError> {
        self.inner.save_chat_thread_pair(pair)
    }

    fn thread_for_chat(
        &self,
        group: GroupId,
        chat: &PeerChatId,
    ) -> Result<Option<ThreadId>, StoreError> {
        self.inner.thread_for_chat(group, chat)
    }

    fn drop_chat_thread_pair(&self, group: GroupId, thread: ThreadId) -> Result<(), StoreError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_pair_drop, "pair drop")?;
        self.inner.drop_chat_thread_pair(group, thread)
    }

    fn save_message_pair(&self, pair: &MessageIdPair) -> Result<(), StoreError> {
        self.inner.save_message_pair(pair)
    }

    fn message_pairs_by_thread(
        &self,
        group: GroupId,
        thread: ThreadId,
    ) -> Result<Vec<MessageIdPair>, StoreError> {
        self.inner.message_pairs_by_thread(group, thread)
    }

    fn delete_message_pairs_by_thread(
        &self,
        group: GroupId,
        thread: ThreadId,
    ) -> Result<u64, StoreError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_message_delete, "message delete")?;
        self.inner.delete_message_pairs_by_thread(group, thread)
    }

    fn sweep_orphan_message_pairs(&self) -> Result<u64, StoreError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_sweep, "sweep")?;
        self.inner.sweep_orphan_message_pairs()
    }
}
