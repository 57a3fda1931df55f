//! Domain error types.

use std::time::Duration;

use store::StoreError;
use thiserror::Error;

use crate::order::OrderError;
use crate::voucher::VoucherRejection;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A business rule rejected the operation.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// The supplied coupon cannot be applied.
    #[error("Voucher rejected: {0}")]
    Voucher(#[from] VoucherRejection),

    /// Malformed or inconsistent input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced order or table does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(StoreError),

    /// The store did not answer in time.
    #[error("Store did not respond within {0:?}")]
    StoreTimeout(Duration),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }

    /// True for optimistic-concurrency failures.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::Store(StoreError::ConcurrencyConflict { .. }))
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::OrderNotFound(id) => DomainError::NotFound {
                entity: "Order",
                id: id.to_string(),
            },
            StoreError::TableNotFound(id) => DomainError::NotFound {
                entity: "Table",
                id: id.to_string(),
            },
            StoreError::CouponExhausted { .. } => {
                DomainError::Voucher(VoucherRejection::UsageLimitReached)
            }
            other => DomainError::Store(other),
        }
    }
}
