use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::api::AppState;
use crate::errors::AppError;
use crate::models::device::{Device, DeviceList, DeviceStatistics, LinkRequest, LinkSession};
use crate::models::record::{AddDeviceRequest, AddDeviceResponse};
use crate::provider::{PageParams, StatisticQuery};

// ── Query parameters ─────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub after: Option<String>,
    pub before: Option<String>,
    /// Kept as text: an unparseable value falls back to the provider default.
    pub page_size: Option<String>,
}

impl ListParams {
    fn into_page(self) -> PageParams {
        PageParams {
            after: self.after.unwrap_or_default(),
            before: self.before.unwrap_or_default(),
            page_size: self
                .page_size
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StatisticParams {
    pub year: Option<String>,
    pub month: Option<String>,
    pub day: Option<String>,
}

impl StatisticParams {
    fn into_query(self) -> Result<StatisticQuery, AppError> {
        fn number(name: &str, raw: Option<String>, default: Option<i32>) -> Result<i32, AppError> {
            match raw.as_deref().map(str::trim) {
                Some(v) if !v.is_empty() => v
                    .parse()
                    .map_err(|_| AppError::validation(format!("invalid {} parameter", name))),
                _ => default.ok_or_else(|| AppError::validation(format!("missing {} parameter", name))),
            }
        }

        Ok(StatisticQuery {
            year: number("year", self.year, None)?,
            month: number("month", self.month, None)?,
            day: number("day", self.day, Some(0))?,
        })
    }
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /api/v1/health
pub async fn health() -> &'static str {
    "OK"
}

/// GET /api/v1/devices: list inverters visible to the client
pub async fn list_devices(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<DeviceList>, AppError> {
    let list = state.coordinator.list_devices(params.into_page()).await?;
    Ok(Json(list))
}

/// GET /api/v1/owners/:id/devices: list inverters linked by one user
pub async fn list_owner_devices(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<DeviceList>, AppError> {
    let list = state
        .coordinator
        .list_owner_devices(&owner_id, params.into_page())
        .await?;
    Ok(Json(list))
}

/// GET /api/v1/devices/:id
pub async fn get_device(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Device>, AppError> {
    let device = state.coordinator.get_device(&id).await?;
    Ok(Json(device))
}

/// GET /api/v1/devices/:id/statistics?year&month&day
pub async fn get_device_statistics(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<StatisticParams>,
) -> Result<Json<DeviceStatistics>, AppError> {
    let query = params.into_query()?;
    let stats = state.coordinator.get_device_statistics(&id, query).await?;
    Ok(Json(stats))
}

/// POST /api/v1/owners/:id/link: start a provider link session
pub async fn link_device(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<String>,
    payload: Result<Json<LinkRequest>, JsonRejection>,
) -> Result<Json<LinkSession>, AppError> {
    let Json(payload) = payload?;
    let session = state.coordinator.link_device(&owner_id, payload).await?;
    Ok(Json(session))
}

/// POST /api/v1/devices: register an inverter locally
pub async fn add_device(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AddDeviceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AddDeviceResponse>), AppError> {
    let Json(payload) = payload?;
    let created = state.coordinator.add_device(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
