//! Process-wide queue registry.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::core::coordinator::QueueCoordinator;
use crate::error::{Error, Result};
use crate::types::QueueConfig;

/// Registry mapping queue names to their runtime coordinators.
///
/// Creation and deletion take the write lock; lookups share the read lock.
/// There is no ordering between a concurrent create and lookup, so callers
/// treat [`Error::NonExistentQueue`] as always possible.
pub struct QueueStore {
    queues: RwLock<HashMap<String, Arc<QueueCoordinator>>>,
}

impl QueueStore {
    /// Create an empty store.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            queues: RwLock::new(HashMap::new()),
        })
    }

    /// Create a queue. Returns `true` when newly created, `false` when a
    /// queue with identical configuration already exists; a same-named queue
    /// with different configuration is an error.
    pub async fn add_queue(self: &Arc<Self>, name: &str, config: QueueConfig) -> Result<bool> {
        let mut queues = self.queues.write().await;
        if let Some(existing) = queues.get(name) {
            if existing.config() == &config {
                return Ok(false);
            }
            return Err(Error::QueueNameExists(name.to_string()));
        }

        let coordinator =
            QueueCoordinator::new(name.to_string(), config, Arc::downgrade(self));
        queues.insert(name.to_string(), coordinator);
        info!(queue = %name, "queue created");
        Ok(true)
    }

    /// Remove a queue and tear down its runtime. Idempotent.
    pub async fn remove_queue(&self, name: &str) {
        let removed = self.queues.write().await.remove(name);
        if let Some(coordinator) = removed {
            coordinator.shutdown();
            info!(queue = %name, "queue deleted");
        }
    }

    /// Whether a queue with this name exists right now.
    pub async fn queue_exists(&self, name: &str) -> bool {
        self.queues.read().await.contains_key(name)
    }

    /// Configuration of a queue.
    pub async fn queue_config(&self, name: &str) -> Result<QueueConfig> {
        let queues = self.queues.read().await;
        queues
            .get(name)
            .map(|coordinator| coordinator.config().clone())
            .ok_or_else(|| Error::NonExistentQueue(name.to_string()))
    }

    /// Runtime handle of a queue.
    pub async fn queue_handle(&self, name: &str) -> Result<Arc<QueueCoordinator>> {
        let queues = self.queues.read().await;
        queues
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NonExistentQueue(name.to_string()))
    }

    /// Sorted queue names, optionally filtered by prefix.
    pub async fn list_queues(&self, name_prefix: Option<&str>) -> Vec<String> {
        let queues = self.queues.read().await;
        let mut names: Vec<String> = queues
            .keys()
            .filter(|name| name_prefix.is_none_or(|prefix| name.starts_with(prefix)))
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Tear down every queue: cancel all message timers, wake blocked
    /// receives, drop all state. Used on process shutdown.
    pub async fn shutdown(&self) {
        let mut queues = self.queues.write().await;
        for (_, coordinator) in queues.drain() {
            coordinator.shutdown();
        }
    }
}
