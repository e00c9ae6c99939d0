//! Topic title resync from peer display names.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::anyhow;
use tracing::{debug, warn};

use topicbridge_core::mapping::TopicKey;
use topicbridge_core::{ChatThreadPair, GroupId, ProbeOutcome};

use crate::platform::{QueuedForum, QueuedPeer};

use super::{ResyncReport, TopicNameSync};

/// Renames forum topics after their peer chat's current display name.
///
/// Remembers the last title it applied per topic, so an unchanged name costs
/// one peer lookup and no forum call.
pub struct DisplayNameResync {
    peer: QueuedPeer,
    forum: QueuedForum,
    applied: Mutex<HashMap<TopicKey, String>>,
}

impl DisplayNameResync {
    pub fn new(peer: QueuedPeer, forum: QueuedForum) -> Self {
        Self {
            peer,
            forum,
            applied: Mutex::new(HashMap::new()),
        }
    }

    fn last_applied(&self, topic: &TopicKey) -> anyhow::Result<Option<String>> {
        let applied = self
            .applied
            .lock()
            .map_err(|_| anyhow!("topic title cache poisoned"))?;
        Ok(applied.get(topic).cloned())
    }

    fn remember(&self, topic: TopicKey, title: String) -> anyhow::Result<()> {
        self.applied
            .lock()
            .map_err(|_| anyhow!("topic title cache poisoned"))?
            .insert(topic, title);
        Ok(())
    }
}

impl TopicNameSync for DisplayNameResync {
    fn resync(&self, group: GroupId, pairs: &[ChatThreadPair]) -> anyhow::Result<ResyncReport> {
        let mut report = ResyncReport::default();

        for pair in pairs.iter().filter(|p| p.tg_chat_id == group && p.is_probeable()) {
            report.checked += 1;

            let name = match self.peer.display_name(pair.chat_id.clone()) {
                Ok(Some(name)) if !name.trim().is_empty() => name.trim().to_string(),
                Ok(_) => continue,
                Err(e) => {
                    warn!(chat_id = %pair.chat_id, error = %e, "failed to look up display name");
                    report.failed += 1;
                    continue;
                }
            };

            let topic = pair.topic();
            if self.last_applied(&topic)?.as_deref() == Some(name.as_str()) {
                continue;
            }

            let edit = self
                .forum
                .edit_topic_name(pair.tg_chat_id, pair.tg_thread_id, name.clone());
            match ProbeOutcome::classify(&edit) {
                ProbeOutcome::Exists if edit.is_ok() => {
                    debug!(thread_id = %pair.tg_thread_id, title = %name, "topic renamed");
                    report.renamed += 1;
                    self.remember(topic, name)?;
                }
                // Title already matches on the forum side.
                ProbeOutcome::Unchanged => self.remember(topic, name)?,
                _ => {
                    if let Err(e) = edit {
                        warn!(thread_id = %pair.tg_thread_id, error = %e, "failed to rename topic");
                    }
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}
