//! In-memory mapping store for tests/dev.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use topicbridge_core::{ChatThreadPair, GroupId, MessageIdPair, PeerChatId, ThreadId};

use super::{MappingStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    /// (group, peer chat) → topic
    chat_threads: HashMap<(GroupId, PeerChatId), ThreadId>,
    /// (peer chat, peer message) → pairing
    messages: HashMap<(PeerChatId, String), MessageIdPair>,
}

/// In-memory mapping store.
#[derive(Debug, Default)]
pub struct InMemoryMappingStore {
    tables: RwLock<Tables>,
}

impl InMemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Total number of message pairings, across all groups.
    pub fn message_pair_count(&self) -> usize {
        self.tables.read().map(|t| t.messages.len()).unwrap_or_default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Storage("mapping store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Storage("mapping store lock poisoned".to_string()))
    }
}

impl MappingStore for InMemoryMappingStore {
    fn chat_thread_pairs(&self, group: GroupId) -> Result<Vec<ChatThreadPair>, StoreError> {
        let tables = self.read()?;
        let mut pairs: Vec<_> = tables
            .chat_threads
            .iter()
            .filter(|((g, _), _)| *g == group)
            .map(|((g, chat), thread)| ChatThreadPair::new(chat.clone(), *g, *thread))
            .collect();
        pairs.sort_by(|a, b| (a.tg_thread_id, &a.chat_id).cmp(&(b.tg_thread_id, &b.chat_id)));
        Ok(pairs)
    }

    fn save_chat_thread_pair(&self, pair: &ChatThreadPair) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        tables
            .chat_threads
            .insert((pair.tg_chat_id, pair.chat_id.clone()), pair.tg_thread_id);
        Ok(())
    }

    fn thread_for_chat(
        &self,
        group: GroupId,
        chat: &PeerChatId,
    ) -> Result<Option<ThreadId>, StoreError> {
        let tables = self.read()?;
        Ok(tables.chat_threads.get(&(group, chat.clone())).copied())
    }

    fn drop_chat_thread_pair(&self, group: GroupId, thread: ThreadId) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        tables
            .chat_threads
            .retain(|(g, _), t| !(*g == group && *t == thread));
        Ok(())
    }

    fn save_message_pair(&self, pair: &MessageIdPair) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        tables.messages.insert(
            (pair.peer_chat_id.clone(), pair.peer_message_id.clone()),
            pair.clone(),
        );
        Ok(())
    }

    fn message_pairs_by_thread(
        &self,
        group: GroupId,
        thread: ThreadId,
    ) -> Result<Vec<MessageIdPair>, StoreError> {
        let tables = self.read()?;
        let mut pairs: Vec<_> = tables
            .messages
            .values()
            .filter(|m| m.topic() == (group, thread))
            .cloned()
            .collect();
        pairs.sort_by_key(|m| m.tg_message_id);
        Ok(pairs)
    }

    fn delete_message_pairs_by_thread(
        &self,
        group: GroupId,
        thread: ThreadId,
    ) -> Result<u64, StoreError> {
        let mut tables = self.write()?;
        let before = tables.messages.len();
        tables.messages.retain(|_, m| m.topic() != (group, thread));
        Ok((before - tables.messages.len()) as u64)
    }

    fn sweep_orphan_message_pairs(&self) -> Result<u64, StoreError> {
        let mut tables = self.write()?;
        let Tables {
            chat_threads,
            messages,
        } = &mut *tables;

        let before = messages.len();
        messages.retain(|_, m| {
            chat_threads
                .iter()
                .any(|((g, _), t)| (*g, *t) == m.topic())
        });
        Ok((before - messages.len()) as u64)
    }
}
