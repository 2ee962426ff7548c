use async_trait::async_trait;
use sqlx::PgPool;

use super::DeviceStore;
use crate::models::record::{DeviceRecord, NewDeviceRecord};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // -- Inverter Operations --

    pub async fn insert_inverter(&self, record: &NewDeviceRecord) -> anyhow::Result<DeviceRecord> {
        let row = sqlx::query_as::<_, DeviceRecord>(
            r#"INSERT INTO inverters (user_id, vendor, model, serial_number, installation_date, total_lifetime_production_kwh)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id, user_id AS owner_id, vendor, model, serial_number, total_lifetime_production_kwh, installation_date"#,
        )
        .bind(record.owner_id)
        .bind(&record.vendor)
        .bind(&record.model)
        .bind(&record.serial_number)
        .bind(record.installation_date)
        .bind(record.total_lifetime_production_kwh)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_inverter(&self, id: i32) -> anyhow::Result<Option<DeviceRecord>> {
        let row = sqlx::query_as::<_, DeviceRecord>(
            "SELECT id, user_id AS owner_id, vendor, model, serial_number, total_lifetime_production_kwh, installation_date FROM inverters WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

#[async_trait]
impl DeviceStore for PgStore {
    async fn create_device(&self, record: &NewDeviceRecord) -> anyhow::Result<DeviceRecord> {
        self.insert_inverter(record).await
    }

    async fn get_device(&self, id: i32) -> anyhow::Result<Option<DeviceRecord>> {
        self.get_inverter(id).await
    }
}
