//! Voucher eligibility rules.
//!
//! [`VoucherValidator`] only reads coupon and usage records. Recording a
//! redemption (or refunding one) is the caller's job, done in the same unit
//! of work as the order write via [`store::CouponUsageChange`].

use chrono::{DateTime, Utc};
use common::{Money, UserId};
use serde::Serialize;
use store::{CouponRecord, CouponTarget, DiscountType, OrderStore};

/// Why a coupon cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum VoucherRejection {
    #[error("Coupon not found")]
    NotFound,

    #[error("Coupon is not active")]
    Inactive,

    #[error("Coupon is not valid yet")]
    NotStarted,

    #[error("Coupon has expired")]
    Expired,

    #[error("Coupon usage limit has been reached")]
    UsageLimitReached,

    #[error("Order total must be at least {min}")]
    MinimumNotMet { min: Money },

    #[error("Coupon is only available to guests")]
    GuestsOnly,

    #[error("Coupon is only available to registered customers")]
    CustomersOnly,

    #[error("Coupon is only available to new customers")]
    NewUsersOnly,

    #[error("Login is required to use this coupon")]
    LoginRequired,

    #[error("You have already used this coupon the maximum number of times")]
    PerUserLimitReached,
}

/// Outcome of evaluating a coupon code against a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoucherVerdict {
    Eligible {
        discount: Money,
        coupon: CouponRecord,
    },
    Ineligible(VoucherRejection),
}

impl VoucherVerdict {
    pub fn is_eligible(&self) -> bool {
        matches!(self, VoucherVerdict::Eligible { .. })
    }

    pub fn discount(&self) -> Option<Money> {
        match self {
            VoucherVerdict::Eligible { discount, .. } => Some(*discount),
            VoucherVerdict::Ineligible(_) => None,
        }
    }

    pub fn into_result(self) -> Result<(Money, CouponRecord), VoucherRejection> {
        match self {
            VoucherVerdict::Eligible { discount, coupon } => Ok((discount, coupon)),
            VoucherVerdict::Ineligible(reason) => Err(reason),
        }
    }
}

/// Evaluates coupon codes against a cart total and an optional customer.
///
/// Checks run in a fixed order and stop at the first failure:
/// existence, active flag, validity window, global usage limit, minimum
/// order value, audience, per-user limit. Only then is the discount computed.
pub struct VoucherValidator<'a, S: OrderStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: OrderStore + ?Sized> VoucherValidator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Evaluates `code` at the current time.
    pub async fn evaluate(
        &self,
        code: &str,
        cart_total: Money,
        user_id: Option<UserId>,
    ) -> store::Result<VoucherVerdict> {
        self.evaluate_at(code, cart_total, user_id, Utc::now()).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn evaluate_at(
        &self,
        code: &str,
        cart_total: Money,
        user_id: Option<UserId>,
        now: DateTime<Utc>,
    ) -> store::Result<VoucherVerdict> {
        let Some(coupon) = self.store.get_coupon_by_code(code).await? else {
            return Ok(VoucherVerdict::Ineligible(VoucherRejection::NotFound));
        };

        if let Some(rejection) = self.check(&coupon, cart_total, user_id, now).await? {
            tracing::debug!(code, %rejection, "Coupon rejected");
            return Ok(VoucherVerdict::Ineligible(rejection));
        }

        Ok(VoucherVerdict::Eligible {
            discount: discount_for(&coupon, cart_total),
            coupon,
        })
    }

    async fn check(
        &self,
        coupon: &CouponRecord,
        cart_total: Money,
        user_id: Option<UserId>,
        now: DateTime<Utc>,
    ) -> store::Result<Option<VoucherRejection>> {
        if !coupon.is_active {
            return Ok(Some(VoucherRejection::Inactive));
        }
        if now < coupon.start_date {
            return Ok(Some(VoucherRejection::NotStarted));
        }
        if now > coupon.end_date {
            return Ok(Some(VoucherRejection::Expired));
        }
        if let Some(limit) = coupon.usage_limit
            && coupon.used_count >= limit
        {
            return Ok(Some(VoucherRejection::UsageLimitReached));
        }
        if cart_total < coupon.min_order_value {
            return Ok(Some(VoucherRejection::MinimumNotMet {
                min: coupon.min_order_value,
            }));
        }

        match (coupon.target_type, user_id) {
            (CouponTarget::Guest, Some(_)) => return Ok(Some(VoucherRejection::GuestsOnly)),
            (CouponTarget::Customer, None) => return Ok(Some(VoucherRejection::CustomersOnly)),
            (CouponTarget::NewUser, None) => return Ok(Some(VoucherRejection::NewUsersOnly)),
            (CouponTarget::NewUser, Some(user_id)) => {
                if self.store.count_completed_orders(user_id).await? > 0 {
                    return Ok(Some(VoucherRejection::NewUsersOnly));
                }
            }
            _ => {}
        }

        if coupon.target_type != CouponTarget::Guest
            && let Some(limit) = coupon.limit_per_user.filter(|l| *l > 0)
        {
            let Some(user_id) = user_id else {
                return Ok(Some(VoucherRejection::LoginRequired));
            };
            let used = self.store.count_coupon_usages(coupon.id, user_id).await?;
            if used >= u64::from(limit) {
                return Ok(Some(VoucherRejection::PerUserLimitReached));
            }
        }

        Ok(None)
    }
}

/// Discount a coupon grants on `cart_total`, without any eligibility checks.
///
/// Percent discounts respect `max_discount_value`; every discount is capped
/// at the cart total.
pub fn discount_for(coupon: &CouponRecord, cart_total: Money) -> Money {
    let raw = match coupon.discount_type {
        DiscountType::Fixed => Money::from_decimal(coupon.discount_value),
        DiscountType::Percent => {
            let discount = cart_total.percent(coupon.discount_value);
            match coupon.max_discount_value {
                Some(cap) => discount.min(cap),
                None => discount,
            }
        }
    };
    raw.non_negative().min(cart_total.non_negative())
}
