use async_trait::async_trait;
use common::{CouponId, MenuItemId, ModifierId, OrderId, TableId, UserId};
use rust_decimal::Decimal;

use crate::model::{
    CouponRecord, CouponUsageChange, MenuItemRecord, ModifierRecord, OrderRecord, TableRecord,
    TableStatus,
};
use crate::{OrderQuery, Page, Result, StoreError, Version};

/// Core trait for the relational persistence gateway.
///
/// Every method is a single request/response round trip. Order writes
/// (`insert_order`, `update_order`) are units of work: the order row, its
/// items, modifier snapshots and any coupon bookkeeping commit together or
/// not at all. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Loads the menu items with the given ids. Unknown ids are omitted.
    async fn get_menu_items(&self, ids: &[MenuItemId]) -> Result<Vec<MenuItemRecord>>;

    /// Loads the modifiers with the given ids. Unknown ids are omitted.
    async fn get_modifiers(&self, ids: &[ModifierId]) -> Result<Vec<ModifierRecord>>;

    /// Reads the configured VAT percentage, if one is set.
    async fn get_vat_rate(&self) -> Result<Option<Decimal>>;

    async fn get_table(&self, table_id: TableId) -> Result<Option<TableRecord>>;

    async fn list_tables(&self) -> Result<Vec<TableRecord>>;

    /// Overwrites a table's status.
    async fn set_table_status(&self, table_id: TableId, status: TableStatus) -> Result<()>;

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>>;

    /// Returns the pending or processing order on a table, if any.
    async fn find_active_order_for_table(&self, table_id: TableId)
    -> Result<Option<OrderRecord>>;

    /// Lists orders newest first.
    async fn query_orders(&self, query: OrderQuery) -> Result<Page<OrderRecord>>;

    /// Inserts a new order with its items.
    ///
    /// Fails with `ActiveOrderExists` if the table already carries an
    /// active order.
    async fn insert_order(
        &self,
        order: &OrderRecord,
        coupon: Option<&CouponUsageChange>,
    ) -> Result<()>;

    /// Replaces an existing order and its items.
    ///
    /// `order.version` must equal the stored version, otherwise the write
    /// fails with `ConcurrencyConflict`. Returns the new version.
    async fn update_order(
        &self,
        order: &OrderRecord,
        coupon: Option<&CouponUsageChange>,
    ) -> Result<Version>;

    /// Counts a user's orders that reached `completed`.
    async fn count_completed_orders(&self, user_id: UserId) -> Result<u64>;

    async fn get_coupon_by_code(&self, code: &str) -> Result<Option<CouponRecord>>;

    /// Counts usage rows for a (coupon, user) pair.
    async fn count_coupon_usages(&self, coupon_id: CouponId, user_id: UserId) -> Result<u64>;
}

/// Extension trait providing convenience methods for order stores.
#[async_trait]
pub trait OrderStoreExt: OrderStore {
    /// Loads an order, failing with `OrderNotFound` when it is missing.
    async fn require_order(&self, order_id: OrderId) -> Result<OrderRecord> {
        self.get_order(order_id)
            .await?
            .ok_or(StoreError::OrderNotFound(order_id))
    }

    /// Loads a table, failing with `TableNotFound` when it is missing.
    async fn require_table(&self, table_id: TableId) -> Result<TableRecord> {
        self.get_table(table_id)
            .await?
            .ok_or(StoreError::TableNotFound(table_id))
    }
}

impl<T: OrderStore + ?Sized> OrderStoreExt for T {}

/// Error returned when an order record is not fit to be written.
#[derive(Debug, Clone)]
pub struct OrderValidationError {
    pub message: String,
}

impl std::fmt::Display for OrderValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Order validation error: {}", self.message)
    }
}

impl std::error::Error for OrderValidationError {}

/// Checks the structural invariants of an order before it is written.
pub fn validate_order_for_write(order: &OrderRecord) -> std::result::Result<(), OrderValidationError> {
    if order.items.is_empty() {
        return Err(OrderValidationError {
            message: "Cannot write an order without items".to_string(),
        });
    }

    for item in &order.items {
        if item.order_id != order.id {
            return Err(OrderValidationError {
                message: format!("Item {} belongs to order {}", item.id, item.order_id),
            });
        }
        if item.quantity == 0 {
            return Err(OrderValidationError {
                message: format!("Item {} has zero quantity", item.id),
            });
        }
        if item.total_price != item.unit_price.multiply(item.quantity) {
            return Err(OrderValidationError {
                message: format!("Item {} total does not match unit price", item.id),
            });
        }
    }

    if order.discount_amount > order.subtotal {
        return Err(OrderValidationError {
            message: "Discount exceeds subtotal".to_string(),
        });
    }

    let expected_total =
        (order.subtotal + order.tax_amount - order.discount_amount).non_negative();
    if order.total_amount != expected_total {
        return Err(OrderValidationError {
            message: format!(
                "Total {} does not equal subtotal + tax - discount ({expected_total})",
                order.total_amount
            ),
        });
    }

    Ok(())
}

impl From<OrderValidationError> for StoreError {
    fn from(err: OrderValidationError) -> Self {
        StoreError::InvalidData(err.message)
    }
}
