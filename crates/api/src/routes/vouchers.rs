//! Voucher preview endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use common::{Money, UserId};
use domain::{VoucherRejection, VoucherVerdict};
use serde::{Deserialize, Serialize};
use store::OrderStore;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ValidateVoucherRequest {
    pub code: String,
    /// Cart subtotal in minor units.
    pub cart_total: Money,
    pub user_id: Option<UserId>,
}

#[derive(Serialize)]
pub struct ValidateVoucherResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<VoucherRejection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// POST /vouchers/validate: evaluate a coupon without redeeming it.
///
/// An ineligible coupon is a successful evaluation, reported in the body.
#[tracing::instrument(skip(state, headers, req), fields(code = %req.code))]
pub async fn validate<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<ValidateVoucherRequest>,
) -> Result<Json<ValidateVoucherResponse>, ApiError> {
    if req.code.trim().is_empty() {
        return Err(ApiError::BadRequest("Voucher code is required".to_string()));
    }
    let user_id = req.user_id.or(state.identify(&headers).user_id);

    let verdict = state
        .orders
        .preview_voucher(&req.code, req.cart_total, user_id)
        .await?;

    let response = match verdict {
        VoucherVerdict::Eligible { discount, .. } => ValidateVoucherResponse {
            valid: true,
            discount: Some(discount),
            rejection: None,
            message: None,
        },
        VoucherVerdict::Ineligible(rejection) => ValidateVoucherResponse {
            valid: false,
            discount: None,
            message: Some(rejection.to_string()),
            rejection: Some(rejection),
        },
    };
    Ok(Json(response))
}
