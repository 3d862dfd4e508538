use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::endpoints::{
    ErrorDetail, MealRecord, NutritionResponse, PredictResponse, MEALS_TABLE_PATH,
    NUTRITION_PATH, PREDICT_PATH,
};
use crate::nutrition::NutritionProfile;
use crate::recognition::gate::Prediction;
use crate::recognition::services::{Classifier, ImageData, NutritionService, PersistenceGateway};

#[derive(Debug, Error)]
pub enum ApiConnectionError {
    #[error("Missing configuration: {0}")]
    MissingConfig(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("API error {status}: {error_body}")]
    ApiError {
        status: StatusCode,
        error_body: String,
    },
    #[error("Service error: {0}")]
    Service(String),
}

impl ApiConnectionError {
    /// Text suitable for showing to the user. Prefers the `detail` field that the scan
    /// service puts in its error bodies.
    pub fn user_message(&self) -> String {
        if let ApiConnectionError::ApiError { error_body, .. } = self {
            if let Ok(parsed) = serde_json::from_str::<ErrorDetail>(error_body) {
                return match parsed.detail {
                    serde_json::Value::String(detail) => detail,
                    other => other.to_string(),
                };
            }
        }
        self.to_string()
    }
}

async fn check_status(response: Response) -> Result<Response, ApiConnectionError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status();
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error body".to_string());
        Err(ApiConnectionError::ApiError { status, error_body })
    }
}

fn build_http_client(timeout: Duration) -> Result<Client, ApiConnectionError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

fn trim_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Client for the food recognition service, which serves both classification and
/// nutrition lookup.
#[derive(Debug, Clone)]
pub struct ScanApiClient {
    http: Client,
    base_url: String,
}

impl ScanApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiConnectionError> {
        if base_url.trim().is_empty() {
            return Err(ApiConnectionError::MissingConfig(
                "scan service base URL".to_string(),
            ));
        }
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url: trim_base_url(base_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Classifier for ScanApiClient {
    async fn predict(
        &self,
        image: &ImageData,
        top_k: usize,
        grams: f64,
    ) -> Result<Vec<Prediction>, ApiConnectionError> {
        let url = format!("{}{}", self.base_url, PREDICT_PATH);
        debug!(file = %image.file_name, top_k, grams, "submitting image for classification");

        let part = Part::bytes(image.bytes.to_vec())
            .file_name(image.file_name.clone())
            .mime_str(&image.content_type)?;
        let form = Form::new().part("image", part);

        let response = self
            .http
            .post(&url)
            .query(&[("top_k", top_k.to_string()), ("grams", grams.to_string())])
            .multipart(form)
            .send()
            .await?;
        let response = check_status(response).await?;
        let body = response.json::<PredictResponse>().await?;
        debug!(count = body.predictions.len(), "classification returned");
        Ok(body.predictions)
    }
}

#[async_trait]
impl NutritionService for ScanApiClient {
    async fn lookup(
        &self,
        label: &str,
        grams: f64,
    ) -> Result<NutritionProfile, ApiConnectionError> {
        let url = format!("{}{}", self.base_url, NUTRITION_PATH);
        debug!(label, grams, "looking up nutrition");

        let response = self
            .http
            .get(&url)
            .query(&[("query", label.to_string()), ("grams", grams.to_string())])
            .send()
            .await?;
        let response = check_status(response).await?;
        let body = response.json::<NutritionResponse>().await?;
        let profile = body.into_profile();
        if profile.is_empty() {
            warn!(label, grams, "nutrition service returned no nutrients");
            return Err(ApiConnectionError::Service(format!(
                "No nutrition data for '{}'",
                label
            )));
        }
        Ok(profile)
    }
}

/// Writes meal rows through the PostgREST interface of the meal store.
#[derive(Debug, Clone)]
pub struct MealStoreClient {
    http: Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
}

impl MealStoreClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiConnectionError> {
        if base_url.trim().is_empty() {
            return Err(ApiConnectionError::MissingConfig("meal store URL".to_string()));
        }
        if api_key.trim().is_empty() {
            return Err(ApiConnectionError::MissingConfig(
                "meal store API key".to_string(),
            ));
        }
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url: trim_base_url(base_url),
            api_key: api_key.to_string(),
            access_token,
        })
    }
}

#[async_trait]
impl PersistenceGateway for MealStoreClient {
    async fn save_meal(&self, record: &MealRecord) -> Result<(), ApiConnectionError> {
        let url = format!("{}{}", self.base_url, MEALS_TABLE_PATH);
        // Row-level security keys on the user's token; the anon key alone only works for
        // permissive tables.
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);

        let response = self
            .http
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await?;
        check_status(response).await?;
        debug!(user = %record.user_id, title = %record.title, "meal row inserted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_prefers_detail() {
        let err = ApiConnectionError::ApiError {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            error_body: r#"{"detail": "Unsupported image format"}"#.to_string(),
        };
        assert_eq!(err.user_message(), "Unsupported image format");
    }

    #[test]
    fn test_user_message_structured_detail() {
        let err = ApiConnectionError::ApiError {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            error_body: r#"{"detail": [{"loc": ["query", "grams"]}]}"#.to_string(),
        };
        assert!(err.user_message().contains("grams"));
    }

    #[test]
    fn test_user_message_falls_back_to_display() {
        let err = ApiConnectionError::ApiError {
            status: StatusCode::BAD_GATEWAY,
            error_body: "upstream timeout".to_string(),
        };
        assert_eq!(err.user_message(), "API error 502 Bad Gateway: upstream timeout");
    }

    #[test]
    fn test_clients_reject_blank_config() {
        let timeout = Duration::from_secs(5);
        assert!(matches!(
            ScanApiClient::new("  ", timeout),
            Err(ApiConnectionError::MissingConfig(_))
        ));
        assert!(matches!(
            MealStoreClient::new("http://store", "", None, timeout),
            Err(ApiConnectionError::MissingConfig(_))
        ));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ScanApiClient::new("http://localhost:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
    }
}
