//! Order API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use shared::order::Order;

use crate::core::ServerState;
use crate::utils::{AppResponse, AppResult, ok};

/// Get order by id
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<Order>>> {
    let order = state.coordinator.get_order(&id)?;
    Ok(ok(order))
}
