use common::{CouponId, OrderId, TableId};
use thiserror::Error;

use crate::Version;

/// Errors that can occur when talking to the persistence gateway.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The order row changed since it was read.
    #[error(
        "Concurrency conflict for order {order_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        order_id: OrderId,
        expected: Version,
        actual: Version,
    },

    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The table does not exist.
    #[error("Table not found: {0}")]
    TableNotFound(TableId),

    /// The table already carries a pending or processing order.
    #[error("Table {table_id} already has an active order")]
    ActiveOrderExists { table_id: TableId },

    /// The coupon reached its usage limit before this redemption committed.
    #[error("Coupon {coupon_id} has reached its usage limit")]
    CouponExhausted { coupon_id: CouponId },

    /// A stored value could not be mapped back into the model.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// The backing store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
