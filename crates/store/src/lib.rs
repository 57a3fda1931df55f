//! Persistence gateway for the order service.
//!
//! [`OrderStore`] is the seam between the domain and storage. Two
//! implementations ship: [`InMemoryStore`] for tests and local runs, and
//! [`PostgresStore`] for production.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;
pub mod store;
pub mod version;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use model::{
    CouponRecord, CouponTarget, CouponUsageChange, CouponUsageRecord, DiscountType,
    ItemModifierSnapshot, ItemStatus, MenuItemRecord, ModifierRecord, OrderItemRecord,
    OrderRecord, OrderStatus, PaymentStatus, TableRecord, TableStatus, UnknownVariant,
    UsageChangeKind,
};
pub use postgres::PostgresStore;
pub use query::{DEFAULT_PER_PAGE, MAX_PER_PAGE, OrderQuery, Page};
pub use store::{OrderStore, OrderStoreExt, OrderValidationError, validate_order_for_write};
pub use version::Version;
