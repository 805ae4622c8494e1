//! Application state shared across handlers.

use std::sync::Arc;

use lexicon_core::Slug;
use lexicon_linker::{LinkJob, LinkQueue};
use lexicon_store::Store;

use crate::config::ServerConfig;
use crate::events::EventBroadcaster;

/// Application state shared across all handlers.
///
/// This is cloneable and can be extracted in handlers using `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Database store, shared with the link worker.
    store: Arc<Store>,
    /// Server configuration.
    config: Arc<ServerConfig>,
    /// Event broadcaster for SSE notifications.
    broadcaster: Arc<EventBroadcaster>,
    /// Jobs waiting for the link worker.
    link_queue: LinkQueue,
}

impl AppState {
    /// Create new application state.
    pub fn new(store: Arc<Store>, config: ServerConfig, link_queue: LinkQueue) -> Self {
        Self {
            store,
            config: Arc::new(config),
            broadcaster: Arc::new(EventBroadcaster::new()),
            link_queue,
        }
    }

    /// Get a reference to the database store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Get a reference to the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get a reference to the event broadcaster.
    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    /// Get a reference to the link queue.
    pub fn link_queue(&self) -> &LinkQueue {
        &self.link_queue
    }

    /// Queues a cross-linking pass for an entry.
    ///
    /// Returns `false` when a pass for the same entry is already pending.
    pub fn schedule_link(&self, slug: Slug) -> bool {
        self.link_queue.enqueue(LinkJob::new(slug))
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("link_queue_depth", &self.link_queue.len())
            .finish_non_exhaustive()
    }
}
