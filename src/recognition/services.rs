use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::api_connection::connection::ApiConnectionError;
use crate::api_connection::endpoints::MealRecord;
use crate::nutrition::NutritionProfile;
use crate::recognition::gate::Prediction;

/// Image classification service.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Returns up to `top_k` predictions ordered by descending score. An empty list means
    /// nothing was detected.
    async fn predict(
        &self,
        image: &ImageData,
        top_k: usize,
        grams: f64,
    ) -> Result<Vec<Prediction>, ApiConnectionError>;
}

/// Authoritative nutrition lookup for a `(label, grams)` pair.
#[async_trait]
pub trait NutritionService: Send + Sync {
    async fn lookup(&self, label: &str, grams: f64)
        -> Result<NutritionProfile, ApiConnectionError>;
}

/// Meal persistence. Treated as atomic; retries are plain re-submissions.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn save_meal(&self, record: &MealRecord) -> Result<(), ApiConnectionError>;
}

/// Raw image bytes as picked by the user.
#[derive(Clone)]
pub struct ImageData {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Arc<[u8]>,
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ImageData {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(&file_name).to_string();
        Self {
            file_name,
            content_type,
            bytes: bytes.into(),
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read image file '{}'", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.jpg".to_string());
        Ok(Self::new(file_name, bytes))
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        _ => "image/jpeg",
    }
}

/// Host-side preview resource (an object URL, a texture, a temp file).
///
/// Released exactly once, when the guard is dropped: superseded by a new selection or
/// cleared by a session reset.
pub struct PreviewGuard {
    id: String,
    release: Option<Box<dyn FnOnce(&str) + Send + Sync>>,
}

impl PreviewGuard {
    pub fn new(id: impl Into<String>, release: impl FnOnce(&str) + Send + Sync + 'static) -> Self {
        Self {
            id: id.into(),
            release: Some(Box::new(release)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Debug for PreviewGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewGuard").field("id", &self.id).finish()
    }
}

impl Drop for PreviewGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(&self.id);
        }
    }
}

/// The image currently bound to a session, with its optional preview.
#[derive(Debug)]
pub struct SelectedImage {
    pub data: ImageData,
    pub preview: Option<PreviewGuard>,
}

impl SelectedImage {
    pub fn new(data: ImageData) -> Self {
        Self {
            data,
            preview: None,
        }
    }

    pub fn with_preview(mut self, preview: PreviewGuard) -> Self {
        self.preview = Some(preview);
        self
    }
}

/// Opaque identifier of the signed-in user. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
