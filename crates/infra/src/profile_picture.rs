//! Relays a peer contact's profile picture into its forum topic.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use topicbridge_core::{GroupId, PeerChatId, ThreadId};

use crate::platform::{QueuedForum, QueuedPeer};

/// Fetches media bytes by URL.
pub trait MediaDownloader: Send + Sync {
    fn download(&self, url: &str) -> anyhow::Result<Vec<u8>>;
}

/// Blocking HTTP downloader.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    http: reqwest::blocking::Client,
}

impl HttpDownloader {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self { http })
    }
}

impl MediaDownloader for HttpDownloader {
    fn download(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .with_context(|| format!("GET {url}"))?
            .error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}

/// What a relay attempt ended with. Failures are already logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Photo posted; carries the forum message id.
    Sent(i64),
    /// The contact has no profile picture.
    NoPicture,
    Failed,
}

/// Posts peer profile pictures as photos into forum topics.
pub struct ProfilePictureRelay {
    group: GroupId,
    peer: QueuedPeer,
    forum: QueuedForum,
    downloader: Arc<dyn MediaDownloader>,
}

impl ProfilePictureRelay {
    pub fn new(
        group: GroupId,
        peer: QueuedPeer,
        forum: QueuedForum,
        downloader: Arc<dyn MediaDownloader>,
    ) -> Self {
        Self {
            group,
            peer,
            forum,
            downloader,
        }
    }

    pub fn relay(&self, chat: &PeerChatId, thread: ThreadId, caption: &str) -> RelayOutcome {
        let url = match self.peer.profile_picture_url(chat.clone()) {
            Ok(Some(url)) if !url.is_empty() => url,
            Ok(_) => {
                info!(chat_id = %chat, "no profile picture to relay");
                return RelayOutcome::NoPicture;
            }
            Err(e) => {
                warn!(chat_id = %chat, error = %e, "failed to fetch profile picture info");
                return RelayOutcome::Failed;
            }
        };

        let bytes = match self.downloader.download(&url) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(chat_id = %chat, url = %url, error = %e, "failed to download profile picture");
                return RelayOutcome::Failed;
            }
        };

        match self.forum.send_photo(self.group, thread, bytes, caption) {
            Ok(sent) => {
                info!(chat_id = %chat, thread_id = %thread, "profile picture sent to forum topic");
                RelayOutcome::Sent(sent.message_id)
            }
            Err(e) => {
                warn!(chat_id = %chat, thread_id = %thread, error = %e, "failed to send profile picture");
                RelayOutcome::Failed
            }
        }
    }
}
