//! Forum platform client contract.

use topicbridge_core::{GroupId, ThreadId};

use crate::dispatch::DispatchError;

/// Failure of a forum API call.
///
/// The `Display` text of `Api` carries the platform's own description
/// (e.g. `Bad Request: TOPIC_NOT_FOUND`), which topic probes classify.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForumError {
    #[error("forum api error {code}: {description}")]
    Api { code: i64, description: String },
    #[error("forum transport error: {0}")]
    Transport(String),
    #[error("forum response could not be decoded: {0}")]
    Decode(String),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl ForumError {
    pub fn api(code: i64, description: impl Into<String>) -> Self {
        Self::Api {
            code,
            description: description.into(),
        }
    }
}

/// A message the forum platform accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    pub message_id: i64,
    pub thread: ThreadId,
}

/// Forum platform operations used by the bridge.
///
/// Implementations perform the call directly; queueing is layered on top.
pub trait ForumClient: Send + Sync {
    /// Reopen a topic. Idempotent; used as the existence probe.
    fn reopen_topic(&self, group: GroupId, thread: ThreadId) -> Result<(), ForumError>;

    fn edit_topic_name(&self, group: GroupId, thread: ThreadId, name: &str)
        -> Result<(), ForumError>;

    fn create_topic(&self, group: GroupId, name: &str) -> Result<ThreadId, ForumError>;

    fn send_text(&self, group: GroupId, thread: ThreadId, text: &str)
        -> Result<SentMessage, ForumError>;

    fn send_photo(
        &self,
        group: GroupId,
        thread: ThreadId,
        photo: Vec<u8>,
        caption: &str,
    ) -> Result<SentMessage, ForumError>;

    fn send_document(
        &self,
        group: GroupId,
        thread: ThreadId,
        file_name: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<SentMessage, ForumError>;

    fn forward_message(
        &self,
        group: GroupId,
        thread: ThreadId,
        from_group: GroupId,
        message_id: i64,
    ) -> Result<SentMessage, ForumError>;
}
