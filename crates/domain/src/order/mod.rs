//! Order state machine and the service that drives it.

mod commands;
mod service;
mod state;

pub use commands::*;
pub use service::{
    MAX_LINE_QUANTITY, OrderPlacement, OrderService, RejectionOutcome, ServiceSettings,
};
pub use state::{ItemLifecycle, OrderLifecycle};

use common::OrderItemId;
use store::{ItemStatus, OrderStatus};
use thiserror::Error;

/// Business-rule violations raised by order operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The order cannot move to the requested status.
    #[error("Invalid status transition: cannot move order from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// The item cannot move to the requested status.
    #[error("Invalid item transition: item {item_id} cannot move from {from} to {to}")]
    InvalidItemTransition {
        item_id: OrderItemId,
        from: ItemStatus,
        to: ItemStatus,
    },

    /// Items can only change on pending or processing orders.
    #[error("Order is {status} and its items can no longer be changed")]
    NotModifiable { status: OrderStatus },

    #[error("Order is already {status}")]
    AlreadyClosed { status: OrderStatus },

    #[error("Item {item_id} does not belong to this order")]
    ItemNotInOrder { item_id: OrderItemId },

    #[error("Item {item_id} is {status}; only pending items can be rejected")]
    ItemNotPending {
        item_id: OrderItemId,
        status: ItemStatus,
    },

    /// Served flag requested while the kitchen is still working.
    #[error("{remaining} item(s) are not ready to be served")]
    NotAllItemsReady { remaining: usize },

    /// Re-approval of a processing order with no new items.
    #[error("Order has no pending items to approve")]
    NothingToApprove,
}
