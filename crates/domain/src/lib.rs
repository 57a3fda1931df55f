//! Domain layer for the restaurant order service.
//!
//! This crate provides:
//! - Pricing engine with VAT and discount capping
//! - Voucher validation against coupon rules
//! - Order state machine and the service that applies it
//! - Table status synchronization
//! - Typed real-time notifications and the `Broadcaster` seam

pub mod error;
pub mod notify;
pub mod order;
pub mod pricing;
pub mod table;
pub mod voucher;

pub use error::DomainError;
pub use notify::{
    Broadcaster, Channel, KitchenLine, NoopBroadcaster, Notification, RecordingBroadcaster,
};
pub use order::{
    AppendItems, Checkout, CreateOrder, ItemLifecycle, LineItem, MAX_LINE_QUANTITY, OrderError,
    OrderLifecycle, OrderPlacement, OrderService, RejectItems, RejectionOutcome, ServiceSettings, SetServed,
    UpdateItemStatus, UpdateOrderStatus,
};
pub use pricing::{OrderTotals, PriceBreakdown, PriceLine, VatRate};
pub use table::{TableSynchronizer, derive_status};
pub use voucher::{VoucherRejection, VoucherValidator, VoucherVerdict, discount_for};
