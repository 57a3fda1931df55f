//! Order and item transition rules.
//!
//! ```text
//! order:  pending ──► processing ──┬──► completed
//!            │            ▲  │     │
//!            │            └──┘     └──► cancelled
//!            └──────────────────────────► completed | cancelled
//!
//! item:   pending ──► preparing ──► ready ──► served
//!            └──► rejected
//! ```
//!
//! `processing → processing` is a re-approval that releases items appended
//! after the first approval to the kitchen.

use store::{ItemStatus, OrderStatus};

/// Transition rules for orders.
pub trait OrderLifecycle {
    /// Pending orders may be approved; processing orders may be re-approved.
    fn can_approve(&self) -> bool;

    /// Items may be appended or rejected.
    fn can_modify_items(&self) -> bool;

    fn can_checkout(&self) -> bool;

    fn can_transition_to(&self, next: OrderStatus) -> bool;
}

impl OrderLifecycle for OrderStatus {
    fn can_approve(&self) -> bool {
        self.is_active()
    }

    fn can_modify_items(&self) -> bool {
        self.is_active()
    }

    fn can_checkout(&self) -> bool {
        self.is_active()
    }

    fn can_transition_to(&self, next: OrderStatus) -> bool {
        match next {
            OrderStatus::Pending => false,
            OrderStatus::Processing => self.can_approve(),
            OrderStatus::Completed | OrderStatus::Cancelled => self.is_active(),
        }
    }
}

/// Transition rules for order items.
pub trait ItemLifecycle {
    /// Only items the kitchen has not accepted can be rejected.
    fn can_reject(&self) -> bool;

    /// Kitchen-driven transitions: `preparing → ready → served`.
    fn can_transition_to(&self, next: ItemStatus) -> bool;

    /// Still waiting on the kitchen.
    fn is_in_kitchen_queue(&self) -> bool;

    fn is_ready_for_service(&self) -> bool;
}

impl ItemLifecycle for ItemStatus {
    fn can_reject(&self) -> bool {
        matches!(self, ItemStatus::Pending)
    }

    fn can_transition_to(&self, next: ItemStatus) -> bool {
        matches!(
            (self, next),
            (ItemStatus::Preparing, ItemStatus::Ready) | (ItemStatus::Ready, ItemStatus::Served)
        )
    }

    fn is_in_kitchen_queue(&self) -> bool {
        matches!(self, ItemStatus::Pending | ItemStatus::Preparing)
    }

    fn is_ready_for_service(&self) -> bool {
        matches!(self, ItemStatus::Ready | ItemStatus::Served)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER_STATES: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    #[test]
    fn active_orders_can_be_approved() {
        assert!(OrderStatus::Pending.can_approve());
        assert!(OrderStatus::Processing.can_approve());
        assert!(!OrderStatus::Completed.can_approve());
        assert!(!OrderStatus::Cancelled.can_approve());
    }

    #[test]
    fn terminal_orders_cannot_be_left() {
        for next in ORDER_STATES {
            assert!(!OrderStatus::Completed.can_transition_to(next));
            assert!(!OrderStatus::Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn no_transition_back_to_pending() {
        for from in ORDER_STATES {
            assert!(!from.can_transition_to(OrderStatus::Pending));
        }
    }

    #[test]
    fn active_orders_can_close() {
        for from in [OrderStatus::Pending, OrderStatus::Processing] {
            assert!(from.can_transition_to(OrderStatus::Completed));
            assert!(from.can_transition_to(OrderStatus::Cancelled));
            assert!(from.can_checkout());
            assert!(from.can_modify_items());
        }
        assert!(!OrderStatus::Completed.can_checkout());
    }

    #[test]
    fn only_pending_items_can_be_rejected() {
        assert!(ItemStatus::Pending.can_reject());
        assert!(!ItemStatus::Preparing.can_reject());
        assert!(!ItemStatus::Ready.can_reject());
        assert!(!ItemStatus::Served.can_reject());
        assert!(!ItemStatus::Rejected.can_reject());
    }

    #[test]
    fn kitchen_transitions_move_forward_one_step() {
        assert!(ItemStatus::Preparing.can_transition_to(ItemStatus::Ready));
        assert!(ItemStatus::Ready.can_transition_to(ItemStatus::Served));

        assert!(!ItemStatus::Pending.can_transition_to(ItemStatus::Ready));
        assert!(!ItemStatus::Preparing.can_transition_to(ItemStatus::Served));
        assert!(!ItemStatus::Ready.can_transition_to(ItemStatus::Preparing));
        assert!(!ItemStatus::Served.can_transition_to(ItemStatus::Ready));
        assert!(!ItemStatus::Rejected.can_transition_to(ItemStatus::Preparing));
    }

    #[test]
    fn readiness() {
        assert!(ItemStatus::Pending.is_in_kitchen_queue());
        assert!(ItemStatus::Preparing.is_in_kitchen_queue());
        assert!(!ItemStatus::Ready.is_in_kitchen_queue());
        assert!(ItemStatus::Ready.is_ready_for_service());
        assert!(ItemStatus::Served.is_ready_for_service());
        assert!(!ItemStatus::Rejected.is_ready_for_service());
    }
}
