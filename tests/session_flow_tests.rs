use async_trait::async_trait;
use nutri_scan::api_connection::endpoints::{HealthMeal, MealRecord};
use nutri_scan::api_connection::ApiConnectionError;
use nutri_scan::nutrition::{NutritionProfile, CARBOHYDRATE, ENERGY, FAT, PROTEIN};
use nutri_scan::recognition::session::PersistOutcome;
use nutri_scan::recognition::{
    Classifier, ImageData, NutritionService, PersistenceGateway, Prediction, RecognitionSession,
    ScanWorkflow, SelectedImage, SessionError, SessionState, UserId,
};
use nutri_scan::sync::{HealthSync, SyncError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

struct FakeClassifier {
    predictions: Vec<Prediction>,
    calls: Mutex<Vec<(usize, f64)>>,
}

impl FakeClassifier {
    fn new(predictions: Vec<Prediction>) -> Arc<Self> {
        Arc::new(Self {
            predictions,
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Classifier for FakeClassifier {
    async fn predict(
        &self,
        _image: &ImageData,
        top_k: usize,
        grams: f64,
    ) -> Result<Vec<Prediction>, ApiConnectionError> {
        self.calls.lock().unwrap().push((top_k, grams));
        Ok(self.predictions.clone())
    }
}

/// Knows kcal per 100 g for a few labels and scales linearly.
#[derive(Default)]
struct FakeNutrition {
    per_100g: HashMap<String, f64>,
    lookups: Mutex<Vec<(String, f64)>>,
}

impl FakeNutrition {
    fn with(foods: &[(&str, f64)]) -> Arc<Self> {
        Arc::new(Self {
            per_100g: foods.iter().map(|(l, k)| (l.to_string(), *k)).collect(),
            lookups: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl NutritionService for FakeNutrition {
    async fn lookup(&self, label: &str, grams: f64) -> Result<NutritionProfile, ApiConnectionError> {
        self.lookups.lock().unwrap().push((label.to_string(), grams));
        let kcal = self
            .per_100g
            .get(label)
            .ok_or_else(|| ApiConnectionError::Service(format!("No nutrition data for '{}'", label)))?;
        let factor = grams / 100.0;
        Ok(NutritionProfile::default()
            .with(ENERGY, kcal * factor)
            .with(PROTEIN, 10.0 * factor)
            .with(CARBOHYDRATE, 30.0 * factor)
            .with(FAT, 8.0 * factor))
    }
}

#[derive(Default)]
struct FakeStore {
    saved: Mutex<Vec<MealRecord>>,
}

#[async_trait]
impl PersistenceGateway for FakeStore {
    async fn save_meal(&self, record: &MealRecord) -> Result<(), ApiConnectionError> {
        self.saved.lock().unwrap().push(record.clone());
        Ok(())
    }
}

#[derive(Default)]
struct FakeHealth {
    pushed: Mutex<Vec<HealthMeal>>,
}

#[async_trait]
impl HealthSync for FakeHealth {
    fn name(&self) -> &str {
        "fake"
    }

    async fn push_meal(&self, meal: &HealthMeal) -> Result<(), ApiConnectionError> {
        self.pushed.lock().unwrap().push(meal.clone());
        Ok(())
    }
}

fn image() -> SelectedImage {
    SelectedImage::new(ImageData::new("plate.jpg", vec![1u8, 2, 3]))
}

fn user() -> UserId {
    UserId::new("user-42").unwrap()
}

#[tokio::test]
async fn test_confident_scan_confirms_and_saves() {
    let classifier = FakeClassifier::new(vec![
        Prediction::new("pizza", 0.9),
        Prediction::new("focaccia", 0.05),
    ]);
    let nutrition = FakeNutrition::with(&[("pizza", 266.0)]);
    let store = Arc::new(FakeStore::default());

    let mut workflow = ScanWorkflow::new(
        RecognitionSession::default(),
        classifier.clone(),
        nutrition.clone(),
    )
    .with_meal_store(store.clone());

    workflow.select_image(image());
    assert_eq!(workflow.analyze().await.unwrap(), SessionState::Confirmed);
    assert_eq!(classifier.calls.lock().unwrap().as_slice(), &[(5, 200.0)]);
    assert_eq!(
        nutrition.lookups.lock().unwrap().as_slice(),
        &[("pizza".to_string(), 200.0)]
    );

    let outcome = workflow.persist(Some(&user()), None).await.unwrap();
    assert_eq!(outcome, PersistOutcome::Saved);
    assert_eq!(workflow.state(), SessionState::Persisted);

    let saved = store.saved.lock().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].title, "pizza");
    assert_eq!(saved[0].calories, 532);
    assert_eq!(saved[0].protein_g, 20);
}

#[tokio::test]
async fn test_uncertain_scan_waits_for_pick() {
    let classifier = FakeClassifier::new(vec![
        Prediction::new("pizza", 0.3),
        Prediction::new("burger", 0.25),
    ]);
    let nutrition = FakeNutrition::with(&[("pizza", 266.0), ("burger", 295.0)]);
    let mut workflow =
        ScanWorkflow::new(RecognitionSession::default(), classifier, nutrition.clone());

    workflow.select_image(image());
    assert_eq!(
        workflow.analyze().await.unwrap(),
        SessionState::NeedsDisambiguation
    );
    assert!(nutrition.lookups.lock().unwrap().is_empty());
    assert!(workflow.session().needs_pick());

    assert_eq!(
        workflow.choose_label("burger").await.unwrap(),
        SessionState::Confirmed
    );
    assert_eq!(workflow.session().selected_label(), Some("burger"));
}

#[tokio::test]
async fn test_portion_change_reresolves() {
    let classifier = FakeClassifier::new(vec![Prediction::new("fried_rice", 0.7)]);
    let nutrition = FakeNutrition::with(&[("fried rice", 163.0)]);
    let mut workflow =
        ScanWorkflow::new(RecognitionSession::default(), classifier, nutrition.clone());

    workflow.select_image(image());
    workflow.analyze().await.unwrap();
    workflow.set_grams(300.0).await.unwrap();

    let result = workflow.session().result().unwrap();
    assert_eq!(result.grams, 300.0);
    assert_eq!(result.macros().unwrap().calories, 489);
    assert_eq!(
        nutrition.lookups.lock().unwrap().as_slice(),
        &[("fried rice".to_string(), 200.0), ("fried rice".to_string(), 300.0)]
    );

    // Same label and weight again: nothing to fetch.
    workflow.choose_label("fried rice").await.unwrap();
    assert_eq!(nutrition.lookups.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_failed_pick_keeps_previous_result() {
    let classifier = FakeClassifier::new(vec![Prediction::new("pizza", 0.9)]);
    let nutrition = FakeNutrition::with(&[("pizza", 266.0)]);
    let mut workflow = ScanWorkflow::new(RecognitionSession::default(), classifier, nutrition);

    workflow.select_image(image());
    workflow.analyze().await.unwrap();
    let before = workflow.session().result().cloned();

    assert_eq!(
        workflow.choose_label("unobtainium").await.unwrap(),
        SessionState::Confirmed
    );
    assert_eq!(workflow.session().result().cloned(), before);
    assert!(workflow
        .session()
        .messages()
        .error
        .as_deref()
        .unwrap()
        .contains("unobtainium"));
}

#[tokio::test]
async fn test_persist_without_store_or_user() {
    let classifier = FakeClassifier::new(vec![Prediction::new("pizza", 0.9)]);
    let nutrition = FakeNutrition::with(&[("pizza", 266.0)]);
    let store = Arc::new(FakeStore::default());

    let mut workflow = ScanWorkflow::new(
        RecognitionSession::default(),
        classifier.clone(),
        nutrition.clone(),
    );
    workflow.select_image(image());
    workflow.analyze().await.unwrap();
    assert_eq!(
        workflow.persist(Some(&user()), None).await,
        Err(SessionError::StoreUnavailable)
    );

    let mut workflow = ScanWorkflow::new(RecognitionSession::default(), classifier, nutrition)
        .with_meal_store(store.clone());
    workflow.select_image(image());
    workflow.analyze().await.unwrap();
    assert_eq!(
        workflow.persist(None, None).await,
        Err(SessionError::LoginRequired)
    );
    assert!(store.saved.lock().unwrap().is_empty());
    assert_eq!(workflow.state(), SessionState::Confirmed);
}

#[tokio::test]
async fn test_zero_calorie_meal_never_reaches_store() {
    let classifier = FakeClassifier::new(vec![Prediction::new("water", 0.95)]);
    let nutrition = FakeNutrition::with(&[("water", 0.0)]);
    let store = Arc::new(FakeStore::default());
    let mut workflow = ScanWorkflow::new(RecognitionSession::default(), classifier, nutrition)
        .with_meal_store(store.clone());

    workflow.select_image(image());
    workflow.analyze().await.unwrap();
    let err = workflow.persist(Some(&user()), None).await.unwrap_err();

    assert!(matches!(err, SessionError::NoCalories { calories: 0 }));
    assert!(store.saved.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_sync_paths() {
    let classifier = FakeClassifier::new(vec![Prediction::new("pizza", 0.9)]);
    let nutrition = FakeNutrition::with(&[("pizza", 266.0)]);
    let health = Arc::new(FakeHealth::default());

    let mut workflow = ScanWorkflow::new(
        RecognitionSession::default(),
        classifier.clone(),
        nutrition.clone(),
    );
    assert!(matches!(workflow.sync().await, Err(SyncError::NothingToSync)));
    workflow.select_image(image());
    workflow.analyze().await.unwrap();
    assert!(matches!(
        workflow.sync().await,
        Err(SyncError::CapabilityMissing)
    ));
    assert!(workflow.session().messages().sync.is_some());

    let mut workflow = ScanWorkflow::new(RecognitionSession::default(), classifier, nutrition)
        .with_health_sync(health.clone());
    workflow.select_image(image());
    workflow.analyze().await.unwrap();
    workflow.sync().await.unwrap();

    let pushed = health.pushed.lock().unwrap();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].name, "pizza");
    assert_eq!(pushed[0].kcal, 532);
}

#[tokio::test]
async fn test_new_image_starts_over() {
    let classifier = FakeClassifier::new(vec![Prediction::new("pizza", 0.9)]);
    let nutrition = FakeNutrition::with(&[("pizza", 266.0)]);
    let mut workflow = ScanWorkflow::new(RecognitionSession::default(), classifier, nutrition);

    workflow.select_image(image());
    workflow.analyze().await.unwrap();
    workflow.select_image(image());

    assert_eq!(workflow.state(), SessionState::Idle);
    assert!(workflow.session().result().is_none());
}
