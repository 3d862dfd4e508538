use thiserror::Error;

/// Command preconditions the session refuses. None of these change session state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("No image selected")]
    NoImage,
    #[error("Analyze an image first")]
    NotAnalyzed,
    #[error("Label is empty")]
    EmptyLabel,
    #[error("Portion must be a positive number of grams, got {0}")]
    InvalidPortion(f64),
    #[error("Analyze and select a label first")]
    NotConfirmed,
    #[error("This meal is already saved")]
    AlreadyPersisted,
    #[error("Wait for the current save to finish")]
    PersistInProgress,
    #[error("Meal storage is not configured")]
    StoreUnavailable,
    #[error("Not logged in")]
    LoginRequired,
    #[error("Calories are {calories}, not saving. Fix the label or portion first")]
    NoCalories { calories: i64 },
}

impl SessionError {
    /// Validation failures block persisting but are not service errors.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SessionError::NoCalories { .. } | SessionError::InvalidPortion(_)
        )
    }
}
