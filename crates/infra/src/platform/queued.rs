//! Platform clients bound to their dispatch queues.
//!
//! Every method wraps the client call as a typed job on the platform's queue
//! and blocks until it ran, so call sites keep a synchronous shape while the
//! worker enforces ordering and the rate limit.

use std::sync::Arc;

use topicbridge_core::{GroupId, PeerChatId, ThreadId};

use crate::dispatch::DispatchQueue;

use super::forum::{ForumClient, ForumError, SentMessage};
use super::peer::{OutboundContent, PeerClient, PeerError, SendReceipt};

/// Forum client whose calls all go through the forum dispatch queue.
#[derive(Clone)]
pub struct QueuedForum {
    client: Arc<dyn ForumClient>,
    queue: DispatchQueue,
}

impl QueuedForum {
    pub fn new(client: Arc<dyn ForumClient>, queue: DispatchQueue) -> Self {
        Self { client, queue }
    }

    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    /// Run an arbitrary forum call on the queue.
    pub fn run<T, F>(&self, f: F) -> Result<T, ForumError>
    where
        F: FnOnce(&dyn ForumClient) -> Result<T, ForumError> + Send + 'static,
        T: Send + 'static,
    {
        let client = self.client.clone();
        self.queue.submit(move || f(client.as_ref()))
    }

    pub fn reopen_topic(&self, group: GroupId, thread: ThreadId) -> Result<(), ForumError> {
        self.run(move |c| c.reopen_topic(group, thread))
    }

    pub fn edit_topic_name(
        &self,
        group: GroupId,
        thread: ThreadId,
        name: impl Into<String>,
    ) -> Result<(), ForumError> {
        let name = name.into();
        self.run(move |c| c.edit_topic_name(group, thread, &name))
    }

    pub fn create_topic(&self, group: GroupId, name: impl Into<String>) -> Result<ThreadId, ForumError> {
        let name = name.into();
        self.run(move |c| c.create_topic(group, &name))
    }

    pub fn send_text(
        &self,
        group: GroupId,
        thread: ThreadId,
        text: impl Into<String>,
    ) -> Result<SentMessage, ForumError> {
        let text = text.into();
        self.run(move |c| c.send_text(group, thread, &text))
    }

    pub fn send_photo(
        &self,
        group: GroupId,
        thread: ThreadId,
        photo: Vec<u8>,
        caption: impl Into<String>,
    ) -> Result<SentMessage, ForumError> {
        let caption = caption.into();
        self.run(move |c| c.send_photo(group, thread, photo, &caption))
    }

    pub fn send_document(
        &self,
        group: GroupId,
        thread: ThreadId,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        caption: impl Into<String>,
    ) -> Result<SentMessage, ForumError> {
        let file_name = file_name.into();
        let caption = caption.into();
        self.run(move |c| c.send_document(group, thread, &file_name, bytes, &caption))
    }

    pub fn forward_message(
        &self,
        group: GroupId,
        thread: ThreadId,
        from_group: GroupId,
        message_id: i64,
    ) -> Result<SentMessage, ForumError> {
        self.run(move |c| c.forward_message(group, thread, from_group, message_id))
    }
}

/// Peer client whose calls all go through the peer dispatch queue.
#[derive(Clone)]
pub struct QueuedPeer {
    client: Arc<dyn PeerClient>,
    queue: DispatchQueue,
}

impl QueuedPeer {
    pub fn new(client: Arc<dyn PeerClient>, queue: DispatchQueue) -> Self {
        Self { client, queue }
    }

    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    pub fn run<T, F>(&self, f: F) -> Result<T, PeerError>
    where
        F: FnOnce(&dyn PeerClient) -> Result<T, PeerError> + Send + 'static,
        T: Send + 'static,
    {
        let client = self.client.clone();
        self.queue.submit(move || f(client.as_ref()))
    }

    pub fn send_message(
        &self,
        chat: PeerChatId,
        content: OutboundContent,
    ) -> Result<SendReceipt, PeerError> {
        self.run(move |c| c.send_message(&chat, &content))
    }

    pub fn profile_picture_url(&self, chat: PeerChatId) -> Result<Option<String>, PeerError> {
        self.run(move |c| c.profile_picture_url(&chat))
    }

    pub fn display_name(&self, chat: PeerChatId) -> Result<Option<String>, PeerError> {
        self.run(move |c| c.display_name(&chat))
    }

    pub fn sync_contacts(&self) -> Result<usize, PeerError> {
        self.run(|c| c.sync_contacts())
    }
}
