//! Recognition session state machine.
//!
//! The session never performs I/O. Commands return the request the host must run
//! ([`AnalysisRequest`], [`LookupKey`], [`PersistRequest`]) and the host feeds each
//! response back through the matching `complete_*` method. Responses that no longer match
//! what the session is waiting for are discarded, which keeps out-of-order completions
//! from overwriting newer state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api_connection::connection::ApiConnectionError;
use crate::api_connection::endpoints::{HealthMeal, MealRecord};
use crate::nutrition::{NutritionProfile, RoundedMacros};
use crate::recognition::candidates::CandidateSet;
use crate::recognition::error::SessionError;
use crate::recognition::gate::{ConfidenceGate, GateDecision, Prediction};
use crate::recognition::labels::normalize_label;
use crate::recognition::portion::{LookupKey, Portion};
use crate::recognition::services::{ImageData, SelectedImage, UserId};

/// Number of predictions requested from the classifier.
pub const DEFAULT_TOP_K: usize = 5;

pub const SAVED_MESSAGE: &str = "Saved to Dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    /// No analysis yet for the current image (or no image at all).
    Idle,
    Analyzing,
    /// Predictions were auto-confirmed but no nutrition is resolved yet; reached when
    /// the automatic lookup fails.
    PredictionsReady,
    NeedsDisambiguation,
    NutritionResolving,
    Confirmed,
    Persisting,
    Persisted,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusMessages {
    pub error: Option<String>,
    pub save: Option<String>,
    pub sync: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    pub candidates: CandidateSet,
    /// Label the confidence gate accepted for this analysis, if any.
    pub auto_label: Option<String>,
    pub selected_label: Option<String>,
    pub nutrition: Option<NutritionProfile>,
    pub grams: f64,
}

impl RecognitionResult {
    pub fn macros(&self) -> Option<RoundedMacros> {
        self.nutrition.as_ref().map(NutritionProfile::rounded_macros)
    }

    fn confirmed(&self) -> Option<(&str, &NutritionProfile)> {
        match (&self.selected_label, &self.nutrition) {
            (Some(label), Some(nutrition)) => Some((label.as_str(), nutrition)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub ticket: u64,
    pub image: ImageData,
    pub top_k: usize,
    pub grams: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersistRequest {
    pub ticket: u64,
    pub record: MealRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    /// Gate accepted rank 0; the returned lookup must be run.
    AutoConfirmed(LookupKey),
    NeedsDisambiguation,
    Failed(String),
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Confirmed,
    Failed(String),
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    Saved,
    Failed(String),
    Stale,
}

#[derive(Debug)]
pub struct RecognitionSession {
    state: SessionState,
    image: Option<SelectedImage>,
    portion: Portion,
    result: Option<RecognitionResult>,
    messages: StatusMessages,
    gate: ConfidenceGate,
    top_k: usize,
    next_ticket: u64,
    pending_analysis: Option<u64>,
    pending_lookup: Option<LookupKey>,
    pending_persist: Option<u64>,
    /// State to return to if the running analysis fails.
    resume_state: SessionState,
}

impl Default for RecognitionSession {
    fn default() -> Self {
        Self::new(Portion::default(), DEFAULT_TOP_K)
    }
}

impl RecognitionSession {
    pub fn new(portion: Portion, top_k: usize) -> Self {
        Self {
            state: SessionState::Idle,
            image: None,
            portion,
            result: None,
            messages: StatusMessages::default(),
            gate: ConfidenceGate::default(),
            top_k: top_k.max(1),
            next_ticket: 0,
            pending_analysis: None,
            pending_lookup: None,
            pending_persist: None,
            resume_state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn result(&self) -> Option<&RecognitionResult> {
        self.result.as_ref()
    }

    pub fn messages(&self) -> &StatusMessages {
        &self.messages
    }

    pub fn grams(&self) -> f64 {
        self.portion.grams()
    }

    pub fn image(&self) -> Option<&SelectedImage> {
        self.image.as_ref()
    }

    pub fn pending_lookup(&self) -> Option<&LookupKey> {
        self.pending_lookup.as_ref()
    }

    pub fn selected_label(&self) -> Option<&str> {
        self.result.as_ref()?.selected_label.as_deref()
    }

    /// True when the user should be prompted to pick a candidate: nothing is selected yet,
    /// or the classifier's best guess was below the confidence threshold.
    pub fn needs_pick(&self) -> bool {
        let Some(result) = &self.result else {
            return false;
        };
        let top_score = result.candidates.top().map(|c| c.score).unwrap_or(0.0);
        (result.selected_label.is_none() && self.pending_lookup.is_none())
            || !(top_score >= self.gate.threshold)
    }

    /// Binds a new image and starts over. The previous image (and its preview) is dropped
    /// here, and every response still in flight for it becomes stale.
    pub fn select_image(&mut self, image: SelectedImage) {
        info!(file = %image.data.file_name, "image selected, starting fresh session");
        self.clear();
        self.image = Some(image);
    }

    pub fn reset(&mut self) {
        debug!("session reset");
        self.clear();
        self.image = None;
    }

    fn clear(&mut self) {
        self.result = None;
        self.messages = StatusMessages::default();
        self.pending_analysis = None;
        self.pending_lookup = None;
        self.pending_persist = None;
        self.state = SessionState::Idle;
        self.resume_state = SessionState::Idle;
    }

    /// Records a new portion. When a label is already selected (or being resolved), returns
    /// the lookup that re-resolves it at the new weight.
    pub fn set_grams(&mut self, grams: f64) -> Result<Option<LookupKey>, SessionError> {
        let portion = Portion::new(grams)?;
        self.ensure_not_persisting()?;
        self.portion = portion;

        // The analysis completion picks up the new portion for its own lookup.
        if self.state == SessionState::Analyzing {
            return Ok(None);
        }

        let label = self
            .pending_lookup
            .as_ref()
            .map(|key| key.label.clone())
            .or_else(|| self.selected_label().map(str::to_string));

        Ok(label.and_then(|label| self.resolve(label)))
    }

    pub fn begin_analysis(&mut self) -> Result<AnalysisRequest, SessionError> {
        let image = self.image.as_ref().ok_or(SessionError::NoImage)?.data.clone();

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        if self.state != SessionState::Analyzing {
            self.resume_state = self.stable_state();
        }
        self.pending_analysis = Some(ticket);
        self.pending_lookup = None;
        self.messages = StatusMessages::default();
        self.state = SessionState::Analyzing;

        info!(ticket, file = %image.file_name, grams = self.portion.grams(), "analysis started");
        Ok(AnalysisRequest {
            ticket,
            image,
            top_k: self.top_k,
            grams: self.portion.grams(),
        })
    }

    pub fn complete_analysis(
        &mut self,
        ticket: u64,
        outcome: Result<Vec<Prediction>, ApiConnectionError>,
    ) -> AnalysisOutcome {
        if self.pending_analysis != Some(ticket) {
            debug!(ticket, "discarding stale analysis response");
            return AnalysisOutcome::Stale;
        }
        self.pending_analysis = None;

        let predictions = match outcome {
            Ok(predictions) => predictions,
            Err(e) => {
                let message = e.user_message();
                warn!(ticket, error = %e, "analysis failed");
                self.messages.error = Some(message.clone());
                self.state = self.resume_state;
                return AnalysisOutcome::Failed(message);
            }
        };

        let decision = self.gate.decide(&predictions);
        self.result = Some(RecognitionResult {
            candidates: CandidateSet::present(&predictions),
            auto_label: decision.auto_label().map(str::to_string),
            selected_label: None,
            nutrition: None,
            grams: self.portion.grams(),
        });
        self.state = SessionState::PredictionsReady;

        match decision {
            GateDecision::AutoConfirmed(label) => {
                info!(ticket, label = %label, "top prediction auto-confirmed");
                AnalysisOutcome::AutoConfirmed(self.issue_lookup(label))
            }
            GateDecision::NeedsDisambiguation => {
                info!(
                    ticket,
                    candidates = predictions.len(),
                    "low confidence, waiting for the user to pick a label"
                );
                self.state = SessionState::NeedsDisambiguation;
                AnalysisOutcome::NeedsDisambiguation
            }
        }
    }

    /// User picked a label (one of the candidates, or typed). Returns the lookup to run,
    /// or `None` when that exact label and portion are already resolved.
    pub fn choose_label(&mut self, label: &str) -> Result<Option<LookupKey>, SessionError> {
        let label = normalize_label(label);
        if label.is_empty() {
            return Err(SessionError::EmptyLabel);
        }
        if self.result.is_none() || self.state == SessionState::Analyzing {
            return Err(SessionError::NotAnalyzed);
        }
        self.ensure_not_persisting()?;
        Ok(self.resolve(label))
    }

    /// The record being saved was built from the confirmed result, which must not move
    /// until the save completes.
    fn ensure_not_persisting(&self) -> Result<(), SessionError> {
        if self.pending_persist.is_some() {
            debug!("command refused while a save is in flight");
            return Err(SessionError::PersistInProgress);
        }
        Ok(())
    }

    fn resolve(&mut self, label: String) -> Option<LookupKey> {
        let key = LookupKey::new(label, self.portion);

        let already_confirmed = self.result.as_ref().is_some_and(|r| {
            r.nutrition.is_some()
                && r.selected_label.as_deref() == Some(key.label.as_str())
                && r.grams == key.grams
        });
        if already_confirmed {
            // Back to what is on screen: anything still in flight is now outdated.
            if self.pending_lookup.take().is_some() {
                self.state = SessionState::Confirmed;
            }
            debug!(label = %key.label, grams = key.grams, "lookup already resolved, skipping");
            return None;
        }

        Some(self.issue_lookup(key.label))
    }

    fn issue_lookup(&mut self, label: String) -> LookupKey {
        let key = LookupKey::new(label, self.portion);
        self.messages = StatusMessages::default();
        self.pending_lookup = Some(key.clone());
        self.state = SessionState::NutritionResolving;
        debug!(label = %key.label, grams = key.grams, "nutrition lookup issued");
        key
    }

    pub fn complete_lookup(
        &mut self,
        key: LookupKey,
        outcome: Result<NutritionProfile, ApiConnectionError>,
    ) -> LookupOutcome {
        if self.pending_lookup.as_ref() != Some(&key) {
            debug!(label = %key.label, grams = key.grams, "discarding stale nutrition response");
            return LookupOutcome::Stale;
        }
        self.pending_lookup = None;

        // An empty profile is never allowed to replace what is on screen.
        let outcome = outcome.and_then(|nutrition| {
            if nutrition.is_empty() {
                Err(ApiConnectionError::Service(format!(
                    "No nutrition data for '{}'",
                    key.label
                )))
            } else {
                Ok(nutrition)
            }
        });

        match outcome {
            Ok(nutrition) => {
                let (candidates, auto_label) = self
                    .result
                    .take()
                    .map(|r| (r.candidates, r.auto_label))
                    .unwrap_or_default();
                info!(
                    label = %key.label,
                    grams = key.grams,
                    kcal = nutrition.energy_kcal(),
                    "nutrition confirmed"
                );
                self.result = Some(RecognitionResult {
                    candidates,
                    auto_label,
                    selected_label: Some(key.label),
                    nutrition: Some(nutrition),
                    grams: key.grams,
                });
                self.state = SessionState::Confirmed;
                LookupOutcome::Confirmed
            }
            Err(e) => {
                let message = e.user_message();
                warn!(label = %key.label, grams = key.grams, error = %e, "nutrition lookup failed");
                self.messages.error = Some(message.clone());
                self.state = self.stable_state();
                LookupOutcome::Failed(message)
            }
        }
    }

    /// Validates the confirmed result and builds the row to persist.
    pub fn begin_persist(
        &mut self,
        user: Option<&UserId>,
        image_ref: Option<String>,
    ) -> Result<PersistRequest, SessionError> {
        self.messages.save = None;
        self.messages.sync = None;

        let Some(user) = user else {
            return self.refuse_persist(SessionError::LoginRequired);
        };
        match self.state {
            SessionState::Confirmed => {}
            SessionState::Persisted => return self.refuse_persist(SessionError::AlreadyPersisted),
            _ => return self.refuse_persist(SessionError::NotConfirmed),
        }
        let Some((label, macros, grams)) = self
            .result
            .as_ref()
            .and_then(|r| r.confirmed().map(|(l, n)| (l.to_string(), n.rounded_macros(), r.grams)))
        else {
            return self.refuse_persist(SessionError::NotConfirmed);
        };

        if macros.calories <= 0 {
            return self.refuse_persist(SessionError::NoCalories {
                calories: macros.calories,
            });
        }

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let record = MealRecord {
            user_id: user.as_str().to_string(),
            title: label.clone(),
            detected_label: label,
            grams,
            calories: macros.calories,
            protein_g: macros.protein_g,
            carbs_g: macros.carbs_g,
            fat_g: macros.fat_g,
            image_url: image_ref,
        };
        self.pending_persist = Some(ticket);
        self.state = SessionState::Persisting;
        info!(ticket, title = %record.title, calories = record.calories, "persisting meal");
        Ok(PersistRequest { ticket, record })
    }

    fn refuse_persist<T>(&mut self, err: SessionError) -> Result<T, SessionError> {
        if err.is_validation() {
            warn!(error = %err, "meal failed validation, not saving");
        } else {
            debug!(error = %err, "persist refused");
        }
        self.messages.save = Some(err.to_string());
        Err(err)
    }

    pub fn complete_persist(
        &mut self,
        ticket: u64,
        outcome: Result<(), ApiConnectionError>,
    ) -> PersistOutcome {
        if self.pending_persist != Some(ticket) {
            debug!(ticket, "discarding stale persistence response");
            return PersistOutcome::Stale;
        }
        self.pending_persist = None;

        match outcome {
            Ok(()) => {
                info!(ticket, "meal saved");
                self.messages.save = Some(SAVED_MESSAGE.to_string());
                if self.state == SessionState::Persisting {
                    self.state = SessionState::Persisted;
                }
                PersistOutcome::Saved
            }
            Err(e) => {
                let message = e.user_message();
                warn!(ticket, error = %e, "saving meal failed");
                self.messages.error = Some(message.clone());
                if self.state == SessionState::Persisting {
                    self.state = SessionState::Confirmed;
                }
                PersistOutcome::Failed(message)
            }
        }
    }

    /// Health platform payload for the confirmed result, if there is one.
    pub fn health_meal(&self, time: DateTime<Utc>) -> Option<HealthMeal> {
        let (label, nutrition) = self.result.as_ref()?.confirmed()?;
        let macros = nutrition.rounded_macros();
        Some(HealthMeal {
            time,
            kcal: macros.calories,
            protein: macros.protein_g,
            carbs: macros.carbs_g,
            fat: macros.fat_g,
            name: label.to_string(),
        })
    }

    pub fn set_sync_message(&mut self, message: impl Into<String>) {
        self.messages.save = None;
        self.messages.sync = Some(message.into());
    }

    fn stable_state(&self) -> SessionState {
        match &self.result {
            None => SessionState::Idle,
            Some(r) if r.nutrition.is_some() => SessionState::Confirmed,
            Some(r) if r.auto_label.is_some() => SessionState::PredictionsReady,
            Some(_) => SessionState::NeedsDisambiguation,
        }
    }
}
