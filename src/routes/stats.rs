use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::common::AppState;
use crate::error::{AppError, AppResult};
use crate::pipeline::{QueueDepth, QueueGauge};
use crate::services::store::{AggregateCounts, DailySummary, FleetStats};

#[derive(Debug, Deserialize)]
pub struct DailyReportQuery {
    /// Calendar day as `YYYY-MM-DD` (UTC). Defaults to today.
    pub date: Option<String>,
}

/// Total, warning and critical reading counts
pub async fn aggregate_counts(State(state): State<AppState>) -> AppResult<Json<AggregateCounts>> {
    Ok(Json(state.store.aggregate_counts().await?))
}

#[derive(Debug, Serialize)]
pub struct FleetOverview {
    #[serde(flatten)]
    pub stats: FleetStats,
    pub configured_devices: usize,
    pub channel_capacity: usize,
    /// Live queue occupancy, absent when no pipeline is attached
    pub queue: Option<QueueDepth>,
}

/// Stored totals alongside the configured fleet and the live queue
pub async fn fleet_stats(State(state): State<AppState>) -> AppResult<Json<FleetOverview>> {
    let stats = state.store.fleet_stats().await?;

    Ok(Json(FleetOverview {
        stats,
        configured_devices: state.config.devices.len(),
        channel_capacity: state.config.channel_capacity,
        queue: state.queue.as_ref().map(QueueGauge::depth),
    }))
}

/// Per-day aggregate for the daily report
pub async fn daily_report(
    State(state): State<AppState>,
    Query(query): Query<DailyReportQuery>,
) -> AppResult<Json<DailySummary>> {
    let date = match query.date.as_deref() {
        None => Utc::now().date_naive(),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
            AppError::BadRequest(format!("Invalid date '{raw}', expected YYYY-MM-DD"))
        })?,
    };

    Ok(Json(state.store.daily_summary(date).await?))
}
