use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::recognition::error::SessionError;
use crate::recognition::portion::LookupKey;
use crate::recognition::services::{
    Classifier, NutritionService, PersistenceGateway, SelectedImage, UserId,
};
use crate::recognition::session::{
    AnalysisOutcome, LookupOutcome, PersistOutcome, RecognitionSession, SessionState,
};
use crate::sync::{sync_meal, HealthSync, SyncError, SYNC_SENT_MESSAGE};

/// Runs a [`RecognitionSession`] against real services, one command at a time.
///
/// Every service call goes through the session's request/complete pair, so the same
/// stale-response rules apply as when a host interleaves calls itself.
pub struct ScanWorkflow {
    session: RecognitionSession,
    classifier: Arc<dyn Classifier>,
    nutrition: Arc<dyn NutritionService>,
    meals: Option<Arc<dyn PersistenceGateway>>,
    health: Option<Arc<dyn HealthSync>>,
}

impl ScanWorkflow {
    pub fn new(
        session: RecognitionSession,
        classifier: Arc<dyn Classifier>,
        nutrition: Arc<dyn NutritionService>,
    ) -> Self {
        Self {
            session,
            classifier,
            nutrition,
            meals: None,
            health: None,
        }
    }

    pub fn with_meal_store(mut self, meals: Arc<dyn PersistenceGateway>) -> Self {
        self.meals = Some(meals);
        self
    }

    pub fn with_health_sync(mut self, health: Arc<dyn HealthSync>) -> Self {
        self.health = Some(health);
        self
    }

    pub fn session(&self) -> &RecognitionSession {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn select_image(&mut self, image: SelectedImage) {
        self.session.select_image(image);
    }

    pub fn reset(&mut self) {
        self.session.reset();
    }

    pub async fn set_grams(&mut self, grams: f64) -> Result<SessionState, SessionError> {
        if let Some(key) = self.session.set_grams(grams)? {
            self.resolve(key).await;
        }
        Ok(self.session.state())
    }

    pub async fn analyze(&mut self) -> Result<SessionState, SessionError> {
        let request = self.session.begin_analysis()?;
        let outcome = self
            .classifier
            .predict(&request.image, request.top_k, request.grams)
            .await;

        if let AnalysisOutcome::AutoConfirmed(key) =
            self.session.complete_analysis(request.ticket, outcome)
        {
            self.resolve(key).await;
        }
        Ok(self.session.state())
    }

    pub async fn choose_label(&mut self, label: &str) -> Result<SessionState, SessionError> {
        if let Some(key) = self.session.choose_label(label)? {
            self.resolve(key).await;
        }
        Ok(self.session.state())
    }

    async fn resolve(&mut self, key: LookupKey) -> LookupOutcome {
        let outcome = self.nutrition.lookup(&key.label, key.grams).await;
        self.session.complete_lookup(key, outcome)
    }

    /// Saves the confirmed meal. `image_ref` is the storage path of an image the host has
    /// already uploaded, if any.
    pub async fn persist(
        &mut self,
        user: Option<&UserId>,
        image_ref: Option<String>,
    ) -> Result<PersistOutcome, SessionError> {
        let Some(meals) = self.meals.clone() else {
            warn!("persist requested without a meal store");
            return Err(SessionError::StoreUnavailable);
        };
        let request = self.session.begin_persist(user, image_ref)?;
        let outcome = meals.save_meal(&request.record).await;
        Ok(self.session.complete_persist(request.ticket, outcome))
    }

    /// Pushes the confirmed meal to the configured health platform.
    pub async fn sync(&mut self) -> Result<(), SyncError> {
        let Some(meal) = self.session.health_meal(Utc::now()) else {
            debug!("sync requested before a meal was confirmed");
            return Err(SyncError::NothingToSync);
        };

        let result = sync_meal(self.health.as_deref(), &meal).await;
        let message = match &result {
            Ok(()) => SYNC_SENT_MESSAGE.to_string(),
            Err(e) => e.to_string(),
        };
        self.session.set_sync_message(message);
        result
    }
}
