pub mod postgres;

use async_trait::async_trait;

use crate::models::record::{DeviceRecord, NewDeviceRecord};

/// Storage for locally registered inverters.
/// Implementations: PgStore (PostgreSQL); tests use an in-memory fake.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Insert a record and return it as stored (with its assigned id).
    async fn create_device(&self, record: &NewDeviceRecord) -> anyhow::Result<DeviceRecord>;

    async fn get_device(&self, id: i32) -> anyhow::Result<Option<DeviceRecord>>;
}
