//! Room registry and publisher.
//!
//! ```text
//! OrderService ──publish──► RealtimeHub
//!                             └── rooms: Channel → broadcast::Sender<frame>
//!                                    │
//!                                    ▼
//!                    Session forwarders (one per joined room)
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use domain::{Broadcaster, Channel, Notification};
use tokio::sync::broadcast;

use crate::message::ServerMessage;

/// Per-room buffer before slow subscribers start losing events.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// An encoded event frame shared by every subscriber of a room.
pub type Frame = Arc<str>;

/// Fan-out of notifications to joined connections.
///
/// Rooms are created on first join and dropped once empty. Publishing to a
/// room nobody has joined is a no-op.
#[derive(Clone)]
pub struct RealtimeHub {
    rooms: Arc<DashMap<Channel, broadcast::Sender<Frame>>>,
    capacity: usize,
}

impl RealtimeHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Subscribes to a room, creating it if needed.
    pub fn subscribe(&self, channel: Channel) -> broadcast::Receiver<Frame> {
        self.rooms
            .entry(channel)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Drops the room if it has no receivers left.
    pub fn prune(&self, channel: Channel) {
        self.rooms
            .remove_if(&channel, |_, sender| sender.receiver_count() == 0);
    }

    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.rooms
            .get(&channel)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn encode(channel: Channel, notification: &Notification) -> Result<Frame, serde_json::Error> {
        let mut value = serde_json::to_value(notification)?;
        let data = value
            .get_mut("data")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null);

        ServerMessage::Event {
            room: channel.name(),
            event: notification.event_name().to_string(),
            data,
        }
        .to_frame()
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl Broadcaster for RealtimeHub {
    fn publish(&self, channel: Channel, notification: &Notification) {
        let event = notification.event_name();
        metrics::counter!("realtime_events_published_total", "event" => event).increment(1);

        let Some(sender) = self.rooms.get(&channel) else {
            tracing::trace!(room = %channel, event, "No subscribers");
            metrics::counter!("realtime_events_undelivered_total").increment(1);
            return;
        };

        let frame = match Self::encode(channel, notification) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(room = %channel, event, error = %e, "Failed to encode event");
                metrics::counter!("realtime_events_undelivered_total").increment(1);
                return;
            }
        };

        let sent = sender.send(frame);
        drop(sender);
        match sent {
            Ok(receivers) => tracing::debug!(room = %channel, event, receivers, "Event published"),
            Err(_) => {
                metrics::counter!("realtime_events_undelivered_total").increment(1);
                self.prune(channel);
            }
        }
    }
}

impl std::fmt::Debug for RealtimeHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeHub")
            .field("rooms", &self.rooms.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{OrderId, TableId};

    fn ready(table_id: TableId) -> Notification {
        Notification::OrderReadyNotification {
            order_id: OrderId::new(),
            table_id,
        }
    }

    #[tokio::test]
    async fn publish_without_room_is_noop() {
        let hub = RealtimeHub::default();
        hub.publish(Channel::Waiter, &ready(TableId::new()));
        assert_eq!(hub.room_count(), 0);
    }

    #[tokio::test]
    async fn frames_carry_room_and_event() {
        let hub = RealtimeHub::default();
        let table_id = TableId::new();
        let mut rx = hub.subscribe(Channel::Waiter);

        hub.publish(Channel::Waiter, &ready(table_id));

        let frame = rx.recv().await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["room"], "waiter");
        assert_eq!(json["event"], "order_ready_notification");
        assert_eq!(json["data"]["table_id"], table_id.to_string());
    }

    #[tokio::test]
    async fn rooms_are_isolated() {
        let hub = RealtimeHub::default();
        let mut kitchen = hub.subscribe(Channel::Kitchen);
        let _waiter = hub.subscribe(Channel::Waiter);

        hub.publish(Channel::Waiter, &ready(TableId::new()));

        assert!(kitchen.try_recv().is_err());
    }

    #[tokio::test]
    async fn empty_rooms_are_pruned() {
        let hub = RealtimeHub::default();
        let rx = hub.subscribe(Channel::Kitchen);
        assert_eq!(hub.subscriber_count(Channel::Kitchen), 1);

        hub.prune(Channel::Kitchen);
        assert_eq!(hub.room_count(), 1);

        drop(rx);
        hub.prune(Channel::Kitchen);
        assert_eq!(hub.room_count(), 0);
    }

    #[tokio::test]
    async fn publishing_to_abandoned_room_drops_it() {
        let hub = RealtimeHub::default();
        drop(hub.subscribe(Channel::Waiter));
        assert_eq!(hub.room_count(), 1);

        hub.publish(Channel::Waiter, &ready(TableId::new()));

        assert_eq!(hub.room_count(), 0);
    }
}
