//! Shared vocabulary for the restaurant order service: typed identifiers and money.

pub mod ids;
pub mod money;

pub use ids::{CouponId, MenuItemId, ModifierId, OrderId, OrderItemId, TableId, UserId};
pub use money::Money;
pub use rust_decimal::Decimal;
