use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::recognition::portion::DEFAULT_GRAMS;
use crate::recognition::session::DEFAULT_TOP_K;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Credentials for the hosted meal table.
#[derive(Debug, Clone, Serialize)]
pub struct MealStoreConfig {
    pub url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanConfig {
    /// Food recognition and nutrition service.
    pub api_url: String,
    pub top_k: usize,
    pub default_grams: f64,
    pub timeout_secs: u64,

    pub meal_store: Option<MealStoreConfig>,
    pub user_id: Option<String>,
    pub health_bridge_url: Option<String>,
    pub meal_catalog_csv: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            top_k: DEFAULT_TOP_K,
            default_grams: DEFAULT_GRAMS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            meal_store: None,
            user_id: None,
            health_bridge_url: None,
            meal_catalog_csv: None,
        }
    }
}

impl ScanConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let meal_store = match (get("MEAL_STORE_URL"), get("MEAL_STORE_API_KEY")) {
            (Some(url), Some(api_key)) => Some(MealStoreConfig {
                url,
                api_key,
                access_token: get("MEAL_STORE_ACCESS_TOKEN"),
            }),
            (Some(_), None) => anyhow::bail!("MEAL_STORE_API_KEY is required when MEAL_STORE_URL is set"),
            (None, _) => None,
        };

        let config = Self {
            api_url: get("NUTRISCAN_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            top_k: get("NUTRISCAN_TOP_K")
                .unwrap_or_else(|| DEFAULT_TOP_K.to_string())
                .parse()
                .context("NUTRISCAN_TOP_K must be a valid number")?,
            default_grams: get("NUTRISCAN_DEFAULT_GRAMS")
                .unwrap_or_else(|| DEFAULT_GRAMS.to_string())
                .parse()
                .context("NUTRISCAN_DEFAULT_GRAMS must be a valid number")?,
            timeout_secs: get("NUTRISCAN_TIMEOUT_SECS")
                .unwrap_or_else(|| DEFAULT_TIMEOUT_SECS.to_string())
                .parse()
                .context("NUTRISCAN_TIMEOUT_SECS must be a valid number")?,
            meal_store,
            user_id: get("NUTRISCAN_USER_ID"),
            health_bridge_url: get("HEALTH_BRIDGE_URL"),
            meal_catalog_csv: get("MEAL_CATALOG_CSV").map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_url.is_empty() {
            anyhow::bail!("Scan service URL cannot be empty");
        }
        if self.top_k == 0 {
            anyhow::bail!("top_k must be greater than 0");
        }
        if !self.default_grams.is_finite() || self.default_grams <= 0.0 {
            anyhow::bail!("Default grams must be a positive number");
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("Timeout must be greater than 0");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ScanConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.default_grams, 200.0);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.meal_store.is_none());
        assert!(config.user_id.is_none());
    }

    #[test]
    fn test_values_read_and_trimmed() {
        let config = ScanConfig::from_lookup(lookup(&[
            ("NUTRISCAN_API_URL", "https://scan.example.com"),
            ("NUTRISCAN_DEFAULT_GRAMS", "150"),
            ("MEAL_STORE_URL", "https://store.example.com"),
            ("MEAL_STORE_API_KEY", "anon-key"),
            ("NUTRISCAN_USER_ID", "  user-1 "),
            ("HEALTH_BRIDGE_URL", ""),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://scan.example.com");
        assert_eq!(config.default_grams, 150.0);
        let store = config.meal_store.unwrap();
        assert_eq!(store.api_key, "anon-key");
        assert!(store.access_token.is_none());
        assert_eq!(config.user_id.as_deref(), Some("user-1"));
        assert!(config.health_bridge_url.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(ScanConfig::from_lookup(lookup(&[("NUTRISCAN_TOP_K", "0")])).is_err());
        assert!(ScanConfig::from_lookup(lookup(&[("NUTRISCAN_TOP_K", "five")])).is_err());
        assert!(ScanConfig::from_lookup(lookup(&[("NUTRISCAN_DEFAULT_GRAMS", "-5")])).is_err());
        assert!(ScanConfig::from_lookup(lookup(&[("NUTRISCAN_TIMEOUT_SECS", "0")])).is_err());
    }

    #[test]
    fn test_store_url_requires_key() {
        let err = ScanConfig::from_lookup(lookup(&[("MEAL_STORE_URL", "https://store")])).unwrap_err();
        assert!(err.to_string().contains("MEAL_STORE_API_KEY"));
    }

    #[test]
    fn test_api_key_never_serialized() {
        let config = ScanConfig::from_lookup(lookup(&[
            ("MEAL_STORE_URL", "https://store"),
            ("MEAL_STORE_API_KEY", "secret-key"),
        ]))
        .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret-key"));
    }
}
