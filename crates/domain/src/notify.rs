//! Notifications emitted after committed state transitions.
//!
//! The order service publishes through the [`Broadcaster`] it was built
//! with. Publishing is synchronous, never blocks and never fails: a
//! notification nobody is listening for is simply dropped.

use std::sync::{Arc, Mutex};

use common::{Money, OrderId, OrderItemId, TableId};
use serde::Serialize;
use store::{ItemStatus, OrderItemRecord, OrderRecord, OrderStatus, TableStatus};

/// Audience a notification is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Kitchen,
    Waiter,
    /// Customers following the order on one table.
    Table(TableId),
}

impl Channel {
    /// Room name used on the wire.
    pub fn name(&self) -> String {
        match self {
            Channel::Kitchen => "kitchen".to_string(),
            Channel::Waiter => "waiter".to_string(),
            Channel::Table(table_id) => format!("table_{table_id}"),
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

/// A line as shown on the kitchen display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KitchenLine {
    pub item_id: OrderItemId,
    pub name: String,
    pub quantity: u32,
    pub notes: Option<String>,
    pub modifiers: Vec<String>,
    pub status: ItemStatus,
}

impl From<&OrderItemRecord> for KitchenLine {
    fn from(item: &OrderItemRecord) -> Self {
        Self {
            item_id: item.id,
            name: item.name.clone(),
            quantity: item.quantity,
            notes: item.notes.clone(),
            modifiers: item.modifiers.iter().map(|m| m.name.clone()).collect(),
            status: item.status,
        }
    }
}

/// Typed real-time notifications.
///
/// Serializes as `{"event": <name>, "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Notification {
    /// An order was placed, or items were appended to one.
    NewOrder {
        order_id: OrderId,
        table_id: TableId,
        total_amount: Money,
        item_count: usize,
        appended: bool,
    },

    /// Lines entering or moving through the kitchen.
    KitchenItemUpdate {
        order_id: OrderId,
        table_id: TableId,
        items: Vec<KitchenLine>,
    },

    ItemStatusUpdate {
        order_id: OrderId,
        item_id: OrderItemId,
        status: ItemStatus,
    },

    /// Every remaining line of the order is ready.
    OrderReadyNotification { order_id: OrderId, table_id: TableId },

    /// Waiter-facing refresh of an order.
    OrderStatusUpdated {
        order_id: OrderId,
        table_id: TableId,
        status: OrderStatus,
        is_served: bool,
        total_amount: Money,
    },

    /// Customer-facing refresh of an order.
    OrderStatusUpdate {
        order_id: OrderId,
        status: OrderStatus,
        subtotal: Money,
        discount_amount: Money,
        total_amount: Money,
    },

    TableStatusUpdate { table_id: TableId, status: TableStatus },

    OrderPaid {
        order_id: OrderId,
        table_id: TableId,
        total_amount: Money,
        payment_method: Option<String>,
    },

    PaymentSuccess { order_id: OrderId, total_amount: Money },

    /// Pending lines were removed from the bill.
    ItemsRejected {
        order_id: OrderId,
        item_ids: Vec<OrderItemId>,
        refunded_amount: Money,
        total_amount: Money,
    },
}

impl Notification {
    /// Wire name of the event.
    pub fn event_name(&self) -> &'static str {
        match self {
            Notification::NewOrder { .. } => "new_order",
            Notification::KitchenItemUpdate { .. } => "kitchen_item_update",
            Notification::ItemStatusUpdate { .. } => "item_status_update",
            Notification::OrderReadyNotification { .. } => "order_ready_notification",
            Notification::OrderStatusUpdated { .. } => "order_status_updated",
            Notification::OrderStatusUpdate { .. } => "order_status_update",
            Notification::TableStatusUpdate { .. } => "table_status_update",
            Notification::OrderPaid { .. } => "order_paid",
            Notification::PaymentSuccess { .. } => "payment_success",
            Notification::ItemsRejected { .. } => "items_rejected",
        }
    }

    pub(crate) fn waiter_refresh(order: &OrderRecord) -> Self {
        Notification::OrderStatusUpdated {
            order_id: order.id,
            table_id: order.table_id,
            status: order.status,
            is_served: order.is_served,
            total_amount: order.total_amount,
        }
    }

    pub(crate) fn table_refresh(order: &OrderRecord) -> Self {
        Notification::OrderStatusUpdate {
            order_id: order.id,
            status: order.status,
            subtotal: order.subtotal,
            discount_amount: order.discount_amount,
            total_amount: order.total_amount,
        }
    }
}

/// Sink for real-time notifications.
pub trait Broadcaster: Send + Sync {
    /// Publishes a notification to a channel. Must not block.
    fn publish(&self, channel: Channel, notification: &Notification);
}

impl<B: Broadcaster + ?Sized> Broadcaster for Arc<B> {
    fn publish(&self, channel: Channel, notification: &Notification) {
        (**self).publish(channel, notification)
    }
}

/// Broadcaster that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBroadcaster;

impl Broadcaster for NoopBroadcaster {
    fn publish(&self, _channel: Channel, _notification: &Notification) {}
}

/// Broadcaster that records every publish, for tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingBroadcaster {
    published: Arc<Mutex<Vec<(Channel, Notification)>>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in order.
    pub fn published(&self) -> Vec<(Channel, Notification)> {
        self.published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Notifications published to one channel.
    pub fn on(&self, channel: Channel) -> Vec<Notification> {
        self.published()
            .into_iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, n)| n)
            .collect()
    }

    /// Number of publishes of `event` to `channel`.
    pub fn count(&self, channel: Channel, event: &str) -> usize {
        self.on(channel)
            .iter()
            .filter(|n| n.event_name() == event)
            .count()
    }

    pub fn clear(&self) {
        self.published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn publish(&self, channel: Channel, notification: &Notification) {
        self.published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((channel, notification.clone()));
    }
}
