//! Request coordination: one operation per exposed capability.
//!
//! Provider-bound operations run `AcquireToken → CallProvider` under a single
//! deadline. Running out of time while waiting for the token is reported as
//! [`AppError::TokenTimeout`]; running out during the provider call as
//! [`AppError::ProviderTimeout`]. A timed-out call is dropped, which abandons
//! the in-flight HTTP request. Nothing here retries.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use crate::errors::AppError;
use crate::models::device::{Device, DeviceList, DeviceStatistics, LinkRequest, LinkSession};
use crate::models::record::{AddDeviceRequest, AddDeviceResponse, NewDeviceRecord};
use crate::provider::auth::AuthClient;
use crate::provider::{CallContext, PageParams, ProviderApi, ProviderError, StatisticQuery};
use crate::store::DeviceStore;

/// Per-request time budgets.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub default: Duration,
    pub link: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(5),
            link: Duration::from_secs(3),
        }
    }
}

pub struct Coordinator {
    auth: Arc<AuthClient>,
    provider: Arc<dyn ProviderApi>,
    store: Arc<dyn DeviceStore>,
    timeouts: Timeouts,
}

impl Coordinator {
    pub fn new(
        auth: Arc<AuthClient>,
        provider: Arc<dyn ProviderApi>,
        store: Arc<dyn DeviceStore>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            auth,
            provider,
            store,
            timeouts,
        }
    }

    pub async fn list_devices(&self, page: PageParams) -> Result<DeviceList, AppError> {
        let provider = &self.provider;
        self.run("failed to list inverters", self.timeouts.default, |ctx| async move {
            provider.list_devices(&ctx, &page).await
        })
        .await
    }

    pub async fn list_owner_devices(
        &self,
        owner_id: &str,
        page: PageParams,
    ) -> Result<DeviceList, AppError> {
        let provider = &self.provider;
        self.run("failed to list user inverters", self.timeouts.default, |ctx| async move {
            provider.list_owner_devices(&ctx, owner_id, &page).await
        })
        .await
    }

    pub async fn get_device(&self, id: &str) -> Result<Device, AppError> {
        let provider = &self.provider;
        self.run("failed to get inverter", self.timeouts.default, |ctx| async move {
            provider.get_device(&ctx, id).await
        })
        .await
    }

    pub async fn get_device_statistics(
        &self,
        id: &str,
        query: StatisticQuery,
    ) -> Result<DeviceStatistics, AppError> {
        if let Err(reason) = query.validate() {
            tracing::warn!(inverter_id = %id, %reason, "rejected statistic query");
            return Err(AppError::validation(format!(
                "invalid inverter statistic parameters: {}",
                reason
            )));
        }

        let provider = &self.provider;
        self.run(
            "failed to get inverter production statistics",
            self.timeouts.default,
            |ctx| async move { provider.get_device_statistics(&ctx, id, query).await },
        )
        .await
    }

    pub async fn link_device(
        &self,
        owner_id: &str,
        request: LinkRequest,
    ) -> Result<LinkSession, AppError> {
        if request.scopes.is_empty() {
            return Err(AppError::validation("at least one scope is required"));
        }
        if request.language.trim().is_empty() {
            return Err(AppError::validation("language is required"));
        }
        if request.redirect_uri.trim().is_empty() {
            return Err(AppError::validation("redirectUri is required"));
        }

        let provider = &self.provider;
        let request = &request;
        self.run("failed to link inverter", self.timeouts.link, |ctx| async move {
            provider.link_device(&ctx, owner_id, request).await
        })
        .await
    }

    /// Register an inverter locally. Does not call the provider.
    pub async fn add_device(&self, request: AddDeviceRequest) -> Result<AddDeviceResponse, AppError> {
        let owner_id: i32 = request.user_id.trim().parse().map_err(|e| {
            tracing::warn!(user_id = %request.user_id, error = %e, "invalid user ID");
            AppError::validation(format!("invalid user ID: {}", e))
        })?;

        for (field, value) in [
            ("vendor", &request.vendor),
            ("model", &request.model),
            ("serialNumber", &request.serial_number),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::validation(format!("{} is required", field)));
            }
        }

        let record = NewDeviceRecord {
            owner_id,
            vendor: request.vendor,
            model: request.model,
            serial_number: request.serial_number,
            installation_date: request.installation_date,
            total_lifetime_production_kwh: request.total_lifetime_production,
        };

        let stored = self.store.create_device(&record).await.map_err(|e| {
            tracing::error!(error = %e, "failed to create inverter in database");
            AppError::Persistence {
                context: "failed to create inverter".to_string(),
                reason: e.to_string(),
            }
        })?;

        tracing::info!(inverter_id = stored.id, owner_id = stored.owner_id, "created inverter");
        Ok(stored.into())
    }

    /// Acquire a token and run one provider call, both bounded by `budget`.
    async fn run<T, F, Fut>(&self, op: &str, budget: Duration, call: F) -> Result<T, AppError>
    where
        F: FnOnce(CallContext) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let deadline = Instant::now() + budget;

        let token = match timeout_at(deadline, self.auth.access_token()).await {
            Ok(Ok(token)) => token,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "{}: failed to get access token", op);
                return Err(AppError::from_auth(op, e));
            }
            Err(_) => {
                tracing::error!(budget_ms = budget.as_millis() as u64, "{}: timeout while getting access token", op);
                return Err(AppError::TokenTimeout {
                    context: op.to_string(),
                });
            }
        };

        let ctx = CallContext::new(&token, Some(deadline));
        match timeout_at(deadline, call(ctx)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "{}", op);
                Err(AppError::from_provider(op, e))
            }
            Err(_) => {
                tracing::error!(budget_ms = budget.as_millis() as u64, "{}: provider request timed out", op);
                Err(AppError::ProviderTimeout {
                    context: op.to_string(),
                })
            }
        }
    }
}
