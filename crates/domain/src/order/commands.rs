//! Order commands.

use common::{MenuItemId, ModifierId, OrderId, OrderItemId, TableId, UserId};
use serde::{Deserialize, Serialize};
use store::{ItemStatus, OrderStatus};

/// One line of a submitted cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub menu_item_id: MenuItemId,
    pub quantity: u32,

    /// Selected modifiers of this menu item.
    #[serde(default)]
    pub modifiers: Vec<ModifierId>,

    #[serde(default)]
    pub notes: Option<String>,
}

impl LineItem {
    pub fn new(menu_item_id: MenuItemId, quantity: u32) -> Self {
        Self {
            menu_item_id,
            quantity,
            modifiers: Vec::new(),
            notes: None,
        }
    }

    pub fn with_modifiers(mut self, modifiers: impl IntoIterator<Item = ModifierId>) -> Self {
        self.modifiers = modifiers.into_iter().collect();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Command to place an order for a table, or merge into its active order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub table_id: TableId,
    pub items: Vec<LineItem>,
    pub customer_id: Option<UserId>,
    pub coupon_code: Option<String>,
}

impl CreateOrder {
    /// Creates a guest order.
    pub fn new(table_id: TableId, items: Vec<LineItem>) -> Self {
        Self {
            table_id,
            items,
            customer_id: None,
            coupon_code: None,
        }
    }

    pub fn for_customer(mut self, customer_id: UserId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_coupon(mut self, code: impl Into<String>) -> Self {
        self.coupon_code = Some(code.into());
        self
    }
}

/// Command to add items to an active order.
#[derive(Debug, Clone)]
pub struct AppendItems {
    pub order_id: OrderId,
    pub items: Vec<LineItem>,
}

impl AppendItems {
    pub fn new(order_id: OrderId, items: Vec<LineItem>) -> Self {
        Self { order_id, items }
    }
}

/// Command to reject items the kitchen has not accepted yet.
#[derive(Debug, Clone)]
pub struct RejectItems {
    pub order_id: OrderId,
    pub item_ids: Vec<OrderItemId>,
}

impl RejectItems {
    pub fn new(order_id: OrderId, item_ids: Vec<OrderItemId>) -> Self {
        Self { order_id, item_ids }
    }
}

/// Command for a kitchen transition of a single item.
#[derive(Debug, Clone)]
pub struct UpdateItemStatus {
    pub order_id: OrderId,
    pub item_id: OrderItemId,
    pub status: ItemStatus,
}

impl UpdateItemStatus {
    pub fn new(order_id: OrderId, item_id: OrderItemId, status: ItemStatus) -> Self {
        Self {
            order_id,
            item_id,
            status,
        }
    }
}

/// Command for an explicit order status change.
#[derive(Debug, Clone)]
pub struct UpdateOrderStatus {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

impl UpdateOrderStatus {
    pub fn new(order_id: OrderId, status: OrderStatus) -> Self {
        Self { order_id, status }
    }
}

#[derive(Debug, Clone)]
pub struct SetServed {
    pub order_id: OrderId,
    pub is_served: bool,
}

impl SetServed {
    pub fn new(order_id: OrderId, is_served: bool) -> Self {
        Self {
            order_id,
            is_served,
        }
    }
}

/// Command to take payment and close an order.
#[derive(Debug, Clone)]
pub struct Checkout {
    pub order_id: OrderId,
    pub payment_method: Option<String>,
}

impl Checkout {
    pub fn new(order_id: OrderId, payment_method: Option<String>) -> Self {
        Self {
            order_id,
            payment_method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_item_builder() {
        let modifier = ModifierId::new();
        let line = LineItem::new(MenuItemId::new(), 2)
            .with_modifiers([modifier])
            .with_notes("less spicy");

        assert_eq!(line.quantity, 2);
        assert_eq!(line.modifiers, vec![modifier]);
        assert_eq!(line.notes.as_deref(), Some("less spicy"));
    }

    #[test]
    fn line_item_defaults_when_deserialized() {
        let menu_item_id = MenuItemId::new();
        let json = format!(r#"{{"menu_item_id":"{menu_item_id}","quantity":1}}"#);
        let line: LineItem = serde_json::from_str(&json).unwrap();

        assert_eq!(line, LineItem::new(menu_item_id, 1));
    }

    #[test]
    fn create_order_builder() {
        let customer = UserId::new();
        let cmd = CreateOrder::new(TableId::new(), vec![])
            .for_customer(customer)
            .with_coupon("SAVE10");

        assert_eq!(cmd.customer_id, Some(customer));
        assert_eq!(cmd.coupon_code.as_deref(), Some("SAVE10"));
    }
}
