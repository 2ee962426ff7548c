//! Locally registered inverter records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caller-facing request to register an inverter locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddDeviceRequest {
    pub user_id: String,
    pub vendor: String,
    pub model: String,
    pub serial_number: String,
    pub total_lifetime_production: f64,
    pub installation_date: DateTime<Utc>,
}

/// Caller-facing view of a stored record; numeric keys are rendered as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddDeviceResponse {
    pub id: String,
    pub user_id: String,
    pub vendor: String,
    pub model: String,
    pub serial_number: String,
    pub total_lifetime_production: f64,
    pub installation_date: DateTime<Utc>,
}

/// Insert parameters for the persistence gateway.
#[derive(Debug, Clone)]
pub struct NewDeviceRecord {
    pub owner_id: i32,
    pub vendor: String,
    pub model: String,
    pub serial_number: String,
    pub installation_date: DateTime<Utc>,
    pub total_lifetime_production_kwh: f64,
}

/// A row of the `inverters` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct DeviceRecord {
    pub id: i32,
    pub owner_id: i32,
    pub vendor: String,
    pub model: String,
    pub serial_number: String,
    pub total_lifetime_production_kwh: f64,
    pub installation_date: DateTime<Utc>,
}

impl From<DeviceRecord> for AddDeviceResponse {
    fn from(record: DeviceRecord) -> Self {
        AddDeviceResponse {
            id: record.id.to_string(),
            user_id: record.owner_id.to_string(),
            vendor: record.vendor,
            model: record.model,
            serial_number: record.serial_number,
            total_lifetime_production: record.total_lifetime_production_kwh,
            installation_date: record.installation_date,
        }
    }
}
