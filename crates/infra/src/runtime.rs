//! Process-wide wiring of queues, maintenance tasks and the scheduler.

use std::io;
use std::sync::Arc;

use tracing::info;

use crate::config::BridgeConfig;
use crate::dispatch::{DispatchQueue, DispatchStats, QueueHandle};
use crate::platform::{ForumClient, PeerClient, Platform, QueuedForum, QueuedPeer};
use crate::profile_picture::{MediaDownloader, ProfilePictureRelay};
use crate::reconcile::{DisplayNameResync, OrphanSweeper, TopicReconciler};
use crate::scheduler::{Scheduler, SchedulerHandle, TaskStats};
use crate::store::MappingStore;

pub const SCHEDULER_THREAD: &str = "bridge-scheduler";
pub const RECONCILE_TASK: &str = "topic_reconcile";
pub const SWEEP_TASK: &str = "orphan_sweep";

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("failed to spawn {thread} thread: {source}")]
    Spawn {
        thread: String,
        #[source]
        source: io::Error,
    },
}

/// Running bridge: both dispatch queues plus the maintenance scheduler.
///
/// Everything is owned here and passed down explicitly; nothing is global.
pub struct BridgeRuntime {
    config: BridgeConfig,
    peer: QueuedPeer,
    forum: QueuedForum,
    store: Arc<dyn MappingStore>,
    scheduler: SchedulerHandle,
    queues: Vec<QueueHandle>,
}

impl BridgeRuntime {
    /// Start both queues, then the scheduler with the reconcile and sweep tasks.
    pub fn start(
        config: BridgeConfig,
        peer: Arc<dyn PeerClient>,
        forum: Arc<dyn ForumClient>,
        store: Arc<dyn MappingStore>,
    ) -> Result<Self, StartError> {
        let (peer_queue, peer_handle) = start_queue(&config, Platform::Peer)?;
        let (forum_queue, forum_handle) = match start_queue(&config, Platform::Forum) {
            Ok(started) => started,
            Err(e) => {
                peer_handle.shutdown();
                return Err(e);
            }
        };
        let queues = vec![peer_handle, forum_handle];

        let peer = QueuedPeer::new(peer, peer_queue);
        let forum = QueuedForum::new(forum, forum_queue);

        let reconciler = TopicReconciler::new(config.target_group, store.clone(), forum.clone())
            .with_contact_sync(Arc::new(peer.clone()))
            .with_name_sync(Arc::new(DisplayNameResync::new(peer.clone(), forum.clone())));
        let sweeper = OrphanSweeper::new(store.clone());

        let scheduler = Scheduler::new(SCHEDULER_THREAD)
            .every(RECONCILE_TASK, config.reconcile_interval(), move || {
                reconciler.run_tick();
            })
            .every(SWEEP_TASK, config.sweep_interval(), move || {
                sweeper.run();
            })
            .start();
        let scheduler = match scheduler {
            Ok(handle) => handle,
            Err(source) => {
                queues.into_iter().for_each(QueueHandle::shutdown);
                return Err(StartError::Spawn {
                    thread: SCHEDULER_THREAD.to_string(),
                    source,
                });
            }
        };

        info!(
            group_id = %config.target_group,
            reconcile_secs = config.reconcile_interval_secs,
            sweep_secs = config.sweep_interval_secs,
            "bridge runtime started"
        );

        Ok(Self {
            config,
            peer,
            forum,
            store,
            scheduler,
            queues,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn peer(&self) -> &QueuedPeer {
        &self.peer
    }

    pub fn forum(&self) -> &QueuedForum {
        &self.forum
    }

    pub fn store(&self) -> &Arc<dyn MappingStore> {
        &self.store
    }

    pub fn queue_stats(&self) -> [(Platform, DispatchStats); 2] {
        [
            (Platform::Peer, self.peer.queue().stats()),
            (Platform::Forum, self.forum.queue().stats()),
        ]
    }

    pub fn task_stats(&self) -> Vec<TaskStats> {
        self.scheduler.stats()
    }

    /// Profile picture relay bound to this runtime's queues.
    pub fn profile_picture_relay(&self, downloader: Arc<dyn MediaDownloader>) -> ProfilePictureRelay {
        ProfilePictureRelay::new(
            self.config.target_group,
            self.peer.clone(),
            self.forum.clone(),
            downloader,
        )
    }

    /// Stop the scheduler, then drain and stop both queues.
    pub fn shutdown(self) {
        self.scheduler.shutdown();
        for handle in self.queues {
            handle.shutdown();
        }
        info!("bridge runtime stopped");
    }
}

fn start_queue(
    config: &BridgeConfig,
    platform: Platform,
) -> Result<(DispatchQueue, QueueHandle), StartError> {
    let settings = match platform {
        Platform::Peer => config.peer_queue,
        Platform::Forum => config.forum_queue,
    };
    DispatchQueue::start(settings.queue_config(platform)).map_err(|source| StartError::Spawn {
        thread: platform.queue_name(),
        source,
    })
}
