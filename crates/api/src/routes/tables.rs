//! Read-only table projection.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use store::{OrderStore, TableRecord};

use crate::error::ApiError;
use crate::state::AppState;

/// GET /tables: tables with their derived status, by number.
pub async fn list<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<TableRecord>>, ApiError> {
    Ok(Json(state.orders.list_tables().await?))
}
