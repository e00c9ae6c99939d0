//! Persisted mapping rows between the two platforms.

use serde::{Deserialize, Serialize};

use crate::id::{GroupId, PeerChatId, ThreadId};

/// Key of a forum topic: the thread id is only unique within its group.
pub type TopicKey = (GroupId, ThreadId);

/// Durable pairing of one peer chat with one forum topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatThreadPair {
    pub chat_id: PeerChatId,
    pub tg_thread_id: ThreadId,
    pub tg_chat_id: GroupId,
}

impl ChatThreadPair {
    pub fn new(chat_id: PeerChatId, tg_chat_id: GroupId, tg_thread_id: ThreadId) -> Self {
        Self {
            chat_id,
            tg_thread_id,
            tg_chat_id,
        }
    }

    pub fn topic(&self) -> TopicKey {
        (self.tg_chat_id, self.tg_thread_id)
    }

    /// Rows pointing at the default topic are never probed nor repaired.
    pub fn is_probeable(&self) -> bool {
        !self.tg_thread_id.is_default_topic()
    }
}

/// Durable pairing of one message on each platform, scoped to a topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageIdPair {
    pub tg_chat_id: GroupId,
    pub tg_thread_id: ThreadId,
    pub peer_chat_id: PeerChatId,
    pub peer_message_id: String,
    pub tg_message_id: i64,
}

impl MessageIdPair {
    pub fn topic(&self) -> TopicKey {
        (self.tg_chat_id, self.tg_thread_id)
    }

    /// True when `pair` is the topic this message belongs to.
    pub fn belongs_to(&self, pair: &ChatThreadPair) -> bool {
        self.topic() == pair.topic()
    }

    /// A row is orphaned when no pairing references its topic.
    pub fn is_orphaned_in<'a, I>(&self, pairs: I) -> bool
    where
        I: IntoIterator<Item = &'a ChatThreadPair>,
    {
        !pairs.into_iter().any(|p| self.belongs_to(p))
    }
}
