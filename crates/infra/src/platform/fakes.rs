//! Recording platform clients for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

use chrono::Utc;

use topicbridge_core::{GroupId, PeerChatId, ThreadId};

use super::forum::{ForumClient, ForumError, SentMessage};
use super::peer::{OutboundContent, PeerClient, PeerError, SendReceipt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForumCall {
    Reopen(GroupId, ThreadId),
    EditName(GroupId, ThreadId, String),
    Create(GroupId, String),
    Text(GroupId, ThreadId, String),
    Photo(GroupId, ThreadId, usize, String),
    Document(GroupId, ThreadId, String),
    Forward(GroupId, ThreadId, GroupId, i64),
}

#[derive(Default)]
pub struct FakeForum {
    calls: Mutex<Vec<ForumCall>>,
    threads: Mutex<Vec<Option<String>>>,
    reopen_failures: Mutex<HashMap<ThreadId, ForumError>>,
    rename_failures: Mutex<HashMap<ThreadId, ForumError>>,
    next_message_id: AtomicI64,
}

impl FakeForum {
    /// Make every reopen of `thread` fail with `err`.
    pub fn fail_reopen(&self, thread: ThreadId, err: ForumError) {
        self.reopen_failures.lock().unwrap().insert(thread, err);
    }

    /// Make every rename of `thread` fail with `err`.
    pub fn fail_rename(&self, thread: ThreadId, err: ForumError) {
        self.rename_failures.lock().unwrap().insert(thread, err);
    }

    pub fn clear_rename_failure(&self, thread: ThreadId) {
        self.rename_failures.lock().unwrap().remove(&thread);
    }

    pub fn calls(&self) -> Vec<ForumCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reopened(&self) -> Vec<ThreadId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ForumCall::Reopen(_, t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn renamed(&self) -> Vec<(ThreadId, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ForumCall::EditName(_, t, name) => Some((t, name)),
                _ => None,
            })
            .collect()
    }

    /// Name of the thread each call ran on.
    pub fn worker_threads(&self) -> Vec<Option<String>> {
        self.threads.lock().unwrap().clone()
    }

    fn record(&self, call: ForumCall) {
        self.threads
            .lock()
            .unwrap()
            .push(thread::current().name().map(str::to_string));
        self.calls.lock().unwrap().push(call);
    }

    fn sent(&self, thread: ThreadId) -> SentMessage {
        SentMessage {
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1,
            thread,
        }
    }
}

impl ForumClient for FakeForum {
    fn reopen_topic(&self, group: GroupId, thread: ThreadId) -> Result<(), ForumError> {
        self.record(ForumCall::Reopen(group, thread));
        match self.reopen_failures.lock().unwrap().get(&thread) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn edit_topic_name(&self, group: GroupId, thread: ThreadId, name: &str) -> Result<(), ForumError> {
        self.record(ForumCall::EditName(group, thread, name.to_string()));
        match self.rename_failures.lock().unwrap().get(&thread) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn create_topic(&self, group: GroupId, name: &str) -> Result<ThreadId, ForumError> {
        self.record(ForumCall::Create(group, name.to_string()));
        Ok(ThreadId::new(1000 + self.next_message_id.fetch_add(1, Ordering::SeqCst)))
    }

    fn send_text(&self, group: GroupId, thread: ThreadId, text: &str) -> Result<SentMessage, ForumError> {
        self.record(ForumCall::Text(group, thread, text.to_string()));
        Ok(self.sent(thread))
    }

    fn send_photo(
        &self,
        group: GroupId,
        thread: ThreadId,
        photo: Vec<u8>,
        caption: &str,
    ) -> Result<SentMessage, ForumError> {
        self.record(ForumCall::Photo(group, thread, photo.len(), caption.to_string()));
        Ok(self.sent(thread))
    }

    fn send_document(
        &self,
        group: GroupId,
        thread: ThreadId,
        file_name: &str,
        _bytes: Vec<u8>,
        _caption: &str,
    ) -> Result<SentMessage, ForumError> {
        self.record(ForumCall::Document(group, thread, file_name.to_string()));
        Ok(self.sent(thread))
    }

    fn forward_message(
        &self,
        group: GroupId,
        thread: ThreadId,
        from_group: GroupId,
        message_id: i64,
    ) -> Result<SentMessage, ForumError> {
        self.record(ForumCall::Forward(group, thread, from_group, message_id));
        Ok(self.sent(thread))
    }
}

#[derive(Default)]
pub struct FakePeer {
    names: Mutex<HashMap<PeerChatId, String>>,
    pictures: Mutex<HashMap<PeerChatId, String>>,
    sync_failure: Mutex<Option<PeerError>>,
    pub contact_syncs: AtomicUsize,
    pub sent: Mutex<Vec<(PeerChatId, OutboundContent)>>,
}

impl FakePeer {
    pub fn set_name(&self, chat: &PeerChatId, name: &str) {
        self.names.lock().unwrap().insert(chat.clone(), name.to_string());
    }

    pub fn set_picture(&self, chat: &PeerChatId, url: &str) {
        self.pictures.lock().unwrap().insert(chat.clone(), url.to_string());
    }

    pub fn fail_contact_sync(&self, err: PeerError) {
        *self.sync_failure.lock().unwrap() = Some(err);
    }
}

impl PeerClient for FakePeer {
    fn send_message(
        &self,
        chat: &PeerChatId,
        content: &OutboundContent,
    ) -> Result<SendReceipt, PeerError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((chat.clone(), content.clone()));
        Ok(SendReceipt {
            message_id: format!("3EB0{:04}", sent.len()),
            timestamp: Utc::now(),
        })
    }

    fn profile_picture_url(&self, chat: &PeerChatId) -> Result<Option<String>, PeerError> {
        Ok(self.pictures.lock().unwrap().get(chat).cloned())
    }

    fn display_name(&self, chat: &PeerChatId) -> Result<Option<String>, PeerError> {
        Ok(self.names.lock().unwrap().get(chat).cloned())
    }

    fn sync_contacts(&self) -> Result<usize, PeerError> {
        self.contact_syncs.fetch_add(1, Ordering::SeqCst);
        match self.sync_failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(self.names.lock().unwrap().len()),
        }
    }
}
