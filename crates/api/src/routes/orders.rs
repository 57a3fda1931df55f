//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use common::{Money, OrderId, OrderItemId, TableId, UserId};
use domain::{
    AppendItems, Checkout, CreateOrder, LineItem, RejectItems, SetServed, UpdateItemStatus,
    UpdateOrderStatus,
};
use serde::{Deserialize, Serialize};
use store::{
    DEFAULT_PER_PAGE, ItemStatus, OrderQuery, OrderRecord, OrderStatus, OrderStore, Page,
};

use super::parse_id;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub table_id: TableId,
    pub items: Vec<LineItem>,
    pub customer_id: Option<UserId>,
    pub coupon_code: Option<String>,
}

#[derive(Deserialize)]
pub struct ListOrdersParams {
    pub status: Option<String>,
    pub is_served: Option<bool>,
    pub table_id: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct ServedRequest {
    pub is_served: bool,
}

#[derive(Deserialize)]
pub struct AppendItemsRequest {
    pub items: Vec<LineItem>,
}

#[derive(Deserialize)]
pub struct RejectItemsRequest {
    pub item_ids: Vec<OrderItemId>,
}

#[derive(Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub payment_method: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct PlacementResponse {
    /// True when the cart was appended to the table's active order.
    pub merged: bool,
    pub order: OrderRecord,
}

#[derive(Serialize)]
pub struct RejectionResponse {
    pub refunded_amount: Money,
    pub order: OrderRecord,
}

// -- Handlers --

/// POST /orders: place an order, or merge into the table's active order.
///
/// The customer is taken from the body, then from a bearer token.
#[tracing::instrument(skip(state, headers, req), fields(table_id = %req.table_id))]
pub async fn create<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<PlacementResponse>), ApiError> {
    let customer_id = req.customer_id.or(state.identify(&headers).user_id);

    let mut cmd = CreateOrder::new(req.table_id, req.items);
    cmd.customer_id = customer_id;
    cmd.coupon_code = req.coupon_code;

    let placement = state.orders.create_order(cmd).await?;
    let status = if placement.is_merged() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((
        status,
        Json(PlacementResponse {
            merged: placement.is_merged(),
            order: placement.into_order(),
        }),
    ))
}

/// GET /orders: list orders newest first.
#[tracing::instrument(skip(state, params))]
pub async fn list<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<Page<OrderRecord>>, ApiError> {
    let mut query = OrderQuery::new().page(
        params.page.unwrap_or(1),
        params.per_page.unwrap_or(DEFAULT_PER_PAGE),
    );
    if let Some(status) = params.status.as_deref() {
        query = query.status(parse_order_status(status)?);
    }
    if let Some(is_served) = params.is_served {
        query = query.served(is_served);
    }
    if let Some(table_id) = params.table_id.as_deref() {
        query = query.table(parse_id::<TableId>("table", table_id)?);
    }

    Ok(Json(state.orders.list_orders(query).await?))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderRecord>, ApiError> {
    let order_id = parse_id::<OrderId>("order", &id)?;
    Ok(Json(state.orders.get_order(order_id).await?))
}

/// PATCH /orders/{id}/status
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<OrderRecord>, ApiError> {
    let order_id = parse_id::<OrderId>("order", &id)?;
    let status = parse_order_status(&req.status)?;

    let order = state
        .orders
        .update_status(UpdateOrderStatus::new(order_id, status))
        .await?;
    Ok(Json(order))
}

/// PATCH /orders/{id}/served
#[tracing::instrument(skip(state, req))]
pub async fn set_served<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<ServedRequest>,
) -> Result<Json<OrderRecord>, ApiError> {
    let order_id = parse_id::<OrderId>("order", &id)?;
    let order = state
        .orders
        .set_served(SetServed::new(order_id, req.is_served))
        .await?;
    Ok(Json(order))
}

/// POST /orders/{id}/approve: release pending items to the kitchen.
#[tracing::instrument(skip(state))]
pub async fn approve<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderRecord>, ApiError> {
    let order_id = parse_id::<OrderId>("order", &id)?;
    Ok(Json(state.orders.approve_order(order_id).await?))
}

/// POST /orders/{id}/items
#[tracing::instrument(skip(state, req))]
pub async fn append_items<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<AppendItemsRequest>,
) -> Result<Json<OrderRecord>, ApiError> {
    let order_id = parse_id::<OrderId>("order", &id)?;
    let order = state
        .orders
        .append_items(AppendItems::new(order_id, req.items))
        .await?;
    Ok(Json(order))
}

/// POST /orders/{id}/items/reject
#[tracing::instrument(skip(state, req))]
pub async fn reject_items<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<RejectItemsRequest>,
) -> Result<Json<RejectionResponse>, ApiError> {
    let order_id = parse_id::<OrderId>("order", &id)?;
    let outcome = state
        .orders
        .reject_items(RejectItems::new(order_id, req.item_ids))
        .await?;

    Ok(Json(RejectionResponse {
        refunded_amount: outcome.refunded_amount,
        order: outcome.order,
    }))
}

/// PATCH /orders/{id}/items/{item_id}/status: kitchen transition.
#[tracing::instrument(skip(state, req))]
pub async fn update_item_status<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((id, item_id)): Path<(String, String)>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<OrderRecord>, ApiError> {
    let order_id = parse_id::<OrderId>("order", &id)?;
    let item_id = parse_id::<OrderItemId>("item", &item_id)?;
    let status = req
        .status
        .parse::<ItemStatus>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let order = state
        .orders
        .update_item_status(UpdateItemStatus::new(order_id, item_id, status))
        .await?;
    Ok(Json(order))
}

/// POST /orders/{id}/checkout
#[tracing::instrument(skip(state, req))]
pub async fn checkout<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<OrderRecord>, ApiError> {
    let order_id = parse_id::<OrderId>("order", &id)?;
    let order = state
        .orders
        .checkout(Checkout::new(order_id, req.payment_method))
        .await?;
    Ok(Json(order))
}

fn parse_order_status(raw: &str) -> Result<OrderStatus, ApiError> {
    raw.parse::<OrderStatus>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}
