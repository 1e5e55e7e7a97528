use crate::connection::{ConnectionInfo, ConnectionRegistry, SubscriberId};
use crate::message::{Event, EventType};
use log::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Interval between keep-alive pings when none is configured.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Owns the subscriber set and fans change events out to it.
pub struct Manager {
    registry: Arc<ConnectionRegistry>,
    heartbeat_interval: Duration,
}

impl Manager {
    pub fn new() -> Self {
        Self::with_heartbeat_interval(DEFAULT_HEARTBEAT_INTERVAL)
    }

    pub fn with_heartbeat_interval(heartbeat_interval: Duration) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            heartbeat_interval,
        }
    }

    /// Registers a new subscriber and starts its heartbeat.
    ///
    /// Must be called from within a Tokio runtime. Events arrive through
    /// [`Subscriber::recv`] until the subscriber is dropped or unsubscribed.
    pub fn subscribe(&self) -> Subscriber {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscriber_id = self.register_sender(tx);

        Subscriber {
            id: subscriber_id,
            receiver: rx,
            registry: Arc::clone(&self.registry),
        }
    }

    fn register_sender(&self, sender: UnboundedSender<Event>) -> SubscriberId {
        let subscriber_id = SubscriberId::new();

        let heartbeat = tokio::spawn(heartbeat(
            Arc::clone(&self.registry),
            subscriber_id.clone(),
            sender.clone(),
            self.heartbeat_interval,
        ));

        self.registry.register(
            subscriber_id.clone(),
            ConnectionInfo {
                sender,
                heartbeat: Some(heartbeat.abort_handle()),
            },
        );
        info!(
            "Registered new SSE subscriber {} ({} active)",
            subscriber_id.as_str(),
            self.registry.len()
        );

        subscriber_id
    }

    /// Removes a subscriber and stops its heartbeat. Unknown ids are ignored.
    pub fn unsubscribe(&self, subscriber_id: &SubscriberId) {
        if self.registry.unregister(subscriber_id) {
            info!("Unregistered SSE subscriber {}", subscriber_id.as_str());
        }
    }

    /// Announces that `path` changed to every current subscriber.
    ///
    /// Subscribers that can no longer receive are dropped from the set; the
    /// others still get the event.
    pub fn broadcast(&self, path: &str) {
        let event = Event::file(path);
        let failed = self.registry.broadcast(&event);
        debug!(
            "Broadcast {} event for {path} to {} subscriber(s)",
            event.event_type(),
            self.registry.len()
        );

        for subscriber_id in failed {
            self.unsubscribe(&subscriber_id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_subscribed(&self, subscriber_id: &SubscriberId) -> bool {
        self.registry.contains(subscriber_id)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of one live-update connection.
///
/// Dropping it removes the subscriber from the set and stops its heartbeat.
pub struct Subscriber {
    id: SubscriberId,
    receiver: UnboundedReceiver<Event>,
    registry: Arc<ConnectionRegistry>,
}

impl Subscriber {
    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// Waits for the next event. Returns `None` once the subscriber has been
    /// unsubscribed and every queued event has been drained.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        if self.registry.unregister(&self.id) {
            info!("SSE subscriber {} disconnected", self.id.as_str());
        }
    }
}

async fn heartbeat(
    registry: Arc<ConnectionRegistry>,
    subscriber_id: SubscriberId,
    sender: UnboundedSender<Event>,
    period: Duration,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if sender.send(Event::ping()).is_err() {
            debug!(
                "Heartbeat for SSE subscriber {} found the client gone",
                subscriber_id.as_str()
            );
            registry.unregister(&subscriber_id);
            break;
        }
        trace!("Sent ping to SSE subscriber {}", subscriber_id.as_str());
    }
}
