//! Provider-side inverter resources.
//!
//! These mirror the provider's JSON schemas and are never mutated locally;
//! the adapter only decodes and re-serializes them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page of inverters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceList {
    pub data: Vec<Device>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pagination {
    pub after: Option<String>,
    pub before: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    #[serde(rename = "userId")]
    pub owner_id: String,
    pub vendor: String,
    pub last_seen: Option<DateTime<Utc>>,
    pub is_reachable: bool,
    pub production_state: ProductionState,
    #[serde(default)]
    pub timezone: Option<String>,
    pub capabilities: Capabilities,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub information: Information,
    pub location: Location,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionState {
    pub production_rate: Option<f64>,
    pub is_producing: Option<bool>,
    pub total_lifetime_production: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub production_state: Capability,
    pub production_statistics: Capability,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    pub is_capable: bool,
    #[serde(default)]
    pub intervention_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Information {
    pub id: String,
    #[serde(rename = "sn")]
    pub serial_number: Option<String>,
    pub brand: String,
    pub model: String,
    #[serde(default)]
    pub site_name: Option<String>,
    pub installation_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Production statistics for one inverter, keyed by resolution name
/// (e.g. `QUARTER_HOUR`, `DAY`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatistics {
    pub timezone: String,
    pub resolutions: HashMap<String, Resolution>,
    #[serde(default)]
    pub retry_after: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub unit: String,
    #[serde(default)]
    pub data: Vec<DataPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPoint {
    pub date: DateTime<Utc>,
    pub value: Option<f64>,
}

/// Body of a link-session request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRequest {
    pub scopes: Vec<String>,
    pub language: String,
    pub redirect_uri: String,
}

/// Ephemeral link session returned by the provider. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSession {
    pub link_url: String,
    pub link_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_decodes_provider_payload() {
        let raw = r#"{
            "id": "inv-1",
            "userId": "user-9",
            "vendor": "SOLIS",
            "lastSeen": "2024-05-01T10:00:00Z",
            "isReachable": true,
            "productionState": {
                "productionRate": 2.5,
                "isProducing": true,
                "totalLifetimeProduction": 1234.5,
                "lastUpdated": "2024-05-01T10:00:00Z"
            },
            "timezone": "Europe/Oslo",
            "capabilities": {
                "productionState": {"isCapable": true, "interventionIds": []},
                "productionStatistics": {"isCapable": false, "interventionIds": ["iv-1"]}
            },
            "scopes": ["inverter:read:data"],
            "information": {
                "id": "inv-1",
                "sn": null,
                "brand": "Solis",
                "model": "S5",
                "siteName": "Roof",
                "installationDate": "2022-01-01T00:00:00Z"
            },
            "location": {"id": null, "longitude": 10.7, "latitude": 59.9, "lastUpdated": null}
        }"#;

        let device: Device = serde_json::from_str(raw).unwrap();
        assert_eq!(device.owner_id, "user-9");
        assert!(device.is_reachable);
        assert_eq!(device.production_state.total_lifetime_production, Some(1234.5));
        assert!(device.information.serial_number.is_none());
        assert_eq!(
            device.capabilities.production_statistics.intervention_ids,
            vec!["iv-1".to_string()]
        );

        // re-serialized with the provider's field names
        let back = serde_json::to_value(&device).unwrap();
        assert_eq!(back["userId"], "user-9");
        assert_eq!(back["information"]["sn"], serde_json::Value::Null);
    }

    #[test]
    fn test_link_request_uses_camel_case() {
        let req = LinkRequest {
            scopes: vec!["inverter:read:data".into()],
            language: "en-US".into(),
            redirect_uri: "https://app.example/linked".into(),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["redirectUri"], "https://app.example/linked");
    }
}
