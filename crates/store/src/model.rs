//! Row model shared by every store implementation.
//!
//! Status columns are stored as lowercase text; every enum here maps to and
//! from that text via `as_str` / `FromStr`.

use chrono::{DateTime, Utc};
use common::{
    CouponId, MenuItemId, ModifierId, Money, OrderId, OrderItemId, TableId, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Version;

/// Error returned when a status string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal) {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $text)] $variant),+
        }

        impl $name {
            /// Returns the stored text form.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

text_enum!(
    /// Lifecycle status of an order.
    OrderStatus ("order status") {
        Pending => "pending",
        Processing => "processing",
        /// Paid and closed (terminal).
        Completed => "completed",
        /// Abandoned (terminal).
        Cancelled => "cancelled",
    }
);

impl OrderStatus {
    /// Pending and processing orders hold their table.
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

text_enum!(
    /// Kitchen status of a single order line.
    ItemStatus ("item status") {
        Pending => "pending",
        Preparing => "preparing",
        Ready => "ready",
        Served => "served",
        Rejected => "rejected",
    }
);

text_enum!(
    /// Payment state of an order.
    PaymentStatus ("payment status") {
        Unpaid => "unpaid",
        Paid => "paid",
    }
);

text_enum!(
    /// Occupancy of a dining table.
    TableStatus ("table status") {
        Available => "available",
        Occupied => "occupied",
        Reserved => "reserved",
    }
);

text_enum!(
    /// How a coupon's `discount_value` is interpreted.
    DiscountType ("discount type") {
        /// `discount_value` is an amount in minor units.
        Fixed => "fixed",
        /// `discount_value` is a percentage of the cart total.
        Percent => "percent",
    }
);

text_enum!(
    /// Audience a coupon is restricted to.
    CouponTarget ("coupon target") {
        Guest => "guest",
        Customer => "customer",
        NewUser => "new_user",
        Any => "any",
    }
);

/// Modifier price and name, frozen onto the order item at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemModifierSnapshot {
    pub modifier_id: ModifierId,
    pub name: String,
    pub price: Money,
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRecord {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub menu_item_id: MenuItemId,
    pub name: String,
    pub quantity: u32,
    /// Base price plus modifier adjustments, as charged.
    pub unit_price: Money,
    pub total_price: Money,
    pub notes: Option<String>,
    pub status: ItemStatus,
    pub modifiers: Vec<ItemModifierSnapshot>,
    pub created_at: DateTime<Utc>,
}

/// An order row together with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub table_id: TableId,
    pub customer_id: Option<UserId>,
    pub status: OrderStatus,
    pub subtotal: Money,
    pub tax_amount: Money,
    pub discount_amount: Money,
    pub coupon_code: Option<String>,
    pub total_amount: Money,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub is_served: bool,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemRecord>,
}

impl OrderRecord {
    /// Items that still count towards the bill.
    pub fn billable_items(&self) -> impl Iterator<Item = &OrderItemRecord> {
        self.items
            .iter()
            .filter(|item| item.status != ItemStatus::Rejected)
    }

    pub fn item(&self, id: OrderItemId) -> Option<&OrderItemRecord> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn item_mut(&mut self, id: OrderItemId) -> Option<&mut OrderItemRecord> {
        self.items.iter_mut().find(|item| item.id == id)
    }
}

/// Catalog entry for something that can be ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItemRecord {
    pub id: MenuItemId,
    pub name: String,
    pub price: Money,
    pub is_available: bool,
}

/// Catalog entry for a priced add-on of a menu item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierRecord {
    pub id: ModifierId,
    pub menu_item_id: MenuItemId,
    pub name: String,
    pub price_adjustment: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRecord {
    pub id: TableId,
    pub number: i32,
    pub status: TableStatus,
    pub capacity: i32,
}

/// A coupon and its eligibility rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponRecord {
    pub id: CouponId,
    pub code: String,
    pub discount_type: DiscountType,
    /// Minor units for fixed coupons, a percentage for percent coupons.
    pub discount_value: Decimal,
    /// Cap on percent discounts.
    pub max_discount_value: Option<Money>,
    pub min_order_value: Money,
    pub usage_limit: Option<u32>,
    pub used_count: u32,
    pub limit_per_user: Option<u32>,
    pub target_type: CouponTarget,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
}

/// A redemption of a coupon by a registered user on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponUsageRecord {
    pub coupon_id: CouponId,
    pub user_id: UserId,
    pub order_id: OrderId,
}

/// Whether a coupon usage is being recorded or refunded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageChangeKind {
    /// Increment `used_count` and insert the usage row.
    Redeem,
    /// Decrement `used_count` and delete the usage row.
    Release,
}

/// Coupon bookkeeping committed in the same unit of work as an order write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponUsageChange {
    pub coupon_id: CouponId,
    pub order_id: OrderId,
    /// Guests redeem without a usage row; only the global counter moves.
    pub user_id: Option<UserId>,
    pub kind: UsageChangeKind,
}

impl CouponUsageChange {
    pub fn redeem(coupon_id: CouponId, order_id: OrderId, user_id: Option<UserId>) -> Self {
        Self {
            coupon_id,
            order_id,
            user_id,
            kind: UsageChangeKind::Redeem,
        }
    }

    pub fn release(coupon_id: CouponId, order_id: OrderId, user_id: Option<UserId>) -> Self {
        Self {
            coupon_id,
            order_id,
            user_id,
            kind: UsageChangeKind::Release,
        }
    }
}
