//! Peer platform client contract.

use chrono::{DateTime, Utc};

use topicbridge_core::PeerChatId;

use crate::dispatch::DispatchError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerError {
    #[error("peer client is not connected")]
    NotConnected,
    #[error("peer request failed: {0}")]
    Request(String),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Content of an outbound peer message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundContent {
    Text(String),
    Image { bytes: Vec<u8>, caption: String },
    Document {
        file_name: String,
        bytes: Vec<u8>,
        caption: String,
    },
}

/// Server acknowledgement of a sent peer message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Peer platform operations used by the bridge.
pub trait PeerClient: Send + Sync {
    fn send_message(
        &self,
        chat: &PeerChatId,
        content: &OutboundContent,
    ) -> Result<SendReceipt, PeerError>;

    /// URL of the chat's current profile picture, `None` when it has none.
    fn profile_picture_url(&self, chat: &PeerChatId) -> Result<Option<String>, PeerError>;

    /// Current display name of a contact or group, if known.
    fn display_name(&self, chat: &PeerChatId) -> Result<Option<String>, PeerError>;

    /// Refresh the local contact list from the server; returns the number of
    /// contacts known afterwards.
    fn sync_contacts(&self) -> Result<usize, PeerError>;
}
