//! Seams to the two messaging platforms.
//!
//! Client libraries are consumed through the `ForumClient` and `PeerClient`
//! traits. Application code never calls them directly: `QueuedForum` and
//! `QueuedPeer` route every call through the platform's dispatch queue.

pub mod forum;
pub mod peer;
pub mod queued;
pub mod telegram;

#[cfg(test)]
pub(crate) mod fakes;

pub use forum::{ForumClient, ForumError, SentMessage};
pub use peer::{OutboundContent, PeerClient, PeerError, SendReceipt};
pub use queued::{QueuedForum, QueuedPeer};
pub use telegram::TelegramForumClient;

/// The two sides of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Peer-to-peer chat network.
    Peer,
    /// Group-forum chat service.
    Forum,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Peer => "peer",
            Platform::Forum => "forum",
        }
    }

    /// Name of the platform's dispatch worker thread.
    pub fn queue_name(self) -> String {
        format!("{}-dispatch", self.as_str())
    }
}

impl core::fmt::Display for Platform {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
