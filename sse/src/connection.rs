use crate::message::Event;
use dashmap::DashMap;
use log::*;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::AbortHandle;

/// Unique identifier for a subscriber (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriberId(String);

impl SubscriberId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-subscriber state owned by the registry.
#[derive(Debug)]
pub struct ConnectionInfo {
    pub sender: UnboundedSender<Event>,
    pub heartbeat: Option<AbortHandle>,
}

/// Concurrent set of live subscribers.
///
/// Insertion, removal and iteration may happen at the same time from different
/// tasks; DashMap shards keep them from blocking each other for long.
pub struct ConnectionRegistry {
    connections: DashMap<SubscriberId, ConnectionInfo>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    pub fn register(&self, subscriber_id: SubscriberId, info: ConnectionInfo) {
        self.connections.insert(subscriber_id, info);
    }

    /// Removes the subscriber and stops its heartbeat. Returns false when it was
    /// already gone.
    pub fn unregister(&self, subscriber_id: &SubscriberId) -> bool {
        match self.connections.remove(subscriber_id) {
            Some((_, info)) => {
                if let Some(heartbeat) = info.heartbeat {
                    heartbeat.abort();
                }
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, subscriber_id: &SubscriberId) -> bool {
        self.connections.contains_key(subscriber_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Sends `event` to every registered subscriber - O(n).
    ///
    /// Delivery failures are logged and skipped. The ids that failed are
    /// returned so the caller can unregister them once iteration is over
    /// (removing while iterating would deadlock on the shard lock).
    pub fn broadcast(&self, event: &Event) -> Vec<SubscriberId> {
        let mut failed = Vec::new();
        for entry in self.connections.iter() {
            if let Err(e) = entry.value().sender.send(event.clone()) {
                warn!(
                    "Failed to send broadcast to subscriber {}: {}",
                    entry.key().as_str(),
                    e
                );
                failed.push(entry.key().clone());
            }
        }
        failed
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
