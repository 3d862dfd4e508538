use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::api_connection::connection::ApiConnectionError;
use crate::api_connection::endpoints::{HealthMeal, HEALTH_BRIDGE_MEALS_PATH};

pub const SYNC_SENT_MESSAGE: &str =
    "Sent to Health Connect. Approve the permissions prompt if one appears.";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Health sync is not available on this device")]
    CapabilityMissing,
    #[error("Nothing to sync yet, confirm a meal first")]
    NothingToSync,
    #[error("Health sync failed: {}", .0.user_message())]
    Bridge(#[from] ApiConnectionError),
}

/// A health platform that accepts finished meals.
#[async_trait]
pub trait HealthSync: Send + Sync {
    fn name(&self) -> &str;

    async fn push_meal(&self, meal: &HealthMeal) -> Result<(), ApiConnectionError>;
}

/// Pushes meals to a local bridge that writes them into Health Connect.
#[derive(Debug, Clone)]
pub struct HealthConnectBridge {
    http: Client,
    base_url: String,
}

impl HealthConnectBridge {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiConnectionError> {
        if base_url.trim().is_empty() {
            return Err(ApiConnectionError::MissingConfig(
                "health bridge URL".to_string(),
            ));
        }
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl HealthSync for HealthConnectBridge {
    fn name(&self) -> &str {
        "Health Connect"
    }

    async fn push_meal(&self, meal: &HealthMeal) -> Result<(), ApiConnectionError> {
        let url = format!("{}{}", self.base_url, HEALTH_BRIDGE_MEALS_PATH);
        debug!(name = %meal.name, kcal = meal.kcal, "pushing meal to health bridge");

        let response = self.http.post(&url).json(meal).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(ApiConnectionError::ApiError { status, error_body });
        }
        Ok(())
    }
}

/// Sends `meal` to `target`, or reports that no target exists on this host.
pub async fn sync_meal(target: Option<&dyn HealthSync>, meal: &HealthMeal) -> Result<(), SyncError> {
    let target = target.ok_or(SyncError::CapabilityMissing)?;
    target.push_meal(meal).await?;
    info!(platform = target.name(), name = %meal.name, "meal synced");
    Ok(())
}
