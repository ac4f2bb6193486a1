use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::common::AppState;
use crate::entity::device_health;
use crate::error::{AppError, AppResult};
use crate::services::store::StoredReading;

const DEFAULT_READINGS_LIMIT: u64 = 50;
const MAX_READINGS_LIMIT: u64 = 1000;

#[derive(Debug, Deserialize)]
pub struct ReadingsQuery {
    pub limit: Option<u64>,
}

/// Latest reading of every device, ordered by device id
pub async fn latest_readings(State(state): State<AppState>) -> AppResult<Json<Vec<StoredReading>>> {
    Ok(Json(state.store.latest_per_device().await?))
}

/// Health rows of every device seen so far
pub async fn list_health(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<device_health::Model>>> {
    Ok(Json(state.store.device_health().await?))
}

pub async fn get_health(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> AppResult<Json<device_health::Model>> {
    state
        .store
        .device_health_for(&device_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Device '{device_id}' not found")))
}

/// Newest-first readings of one device
pub async fn device_readings(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(query): Query<ReadingsQuery>,
) -> AppResult<Json<Vec<StoredReading>>> {
    let limit = query.limit.unwrap_or(DEFAULT_READINGS_LIMIT);
    if limit == 0 || limit > MAX_READINGS_LIMIT {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {MAX_READINGS_LIMIT}"
        )));
    }

    Ok(Json(state.store.readings_for_device(&device_id, limit).await?))
}
