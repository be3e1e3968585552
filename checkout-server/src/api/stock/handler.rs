//! Stock API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

use crate::core::ServerState;
use crate::utils::{AppResponse, AppResult, ok};

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub units: u32,
    /// When true, set the absolute level instead of adding
    #[serde(default)]
    pub absolute: bool,
}

#[derive(Debug, Serialize)]
pub struct StockLevel {
    pub product_id: String,
    pub available: u32,
}

/// Operator restock or seed
pub async fn restock(
    State(state): State<ServerState>,
    Path(product_id): Path<String>,
    Json(payload): Json<RestockRequest>,
) -> AppResult<Json<AppResponse<StockLevel>>> {
    let available = if payload.absolute {
        state.stock.set_level(&product_id, payload.units)?;
        payload.units
    } else {
        state.stock.restock(&product_id, payload.units)?
    };

    tracing::info!(product_id = %product_id, available, "Stock updated");
    Ok(ok(StockLevel {
        product_id,
        available,
    }))
}

/// Current availability
pub async fn availability(
    State(state): State<ServerState>,
    Path(product_id): Path<String>,
) -> AppResult<Json<AppResponse<StockLevel>>> {
    let available = state.stock.available(&product_id)?;
    Ok(ok(StockLevel {
        product_id,
        available,
    }))
}
