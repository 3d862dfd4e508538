use serde::{Deserialize, Serialize};

use crate::recognition::labels::normalize_label;

/// Rank-0 score at or above which a label is accepted without asking the user.
pub const AUTO_ACCEPT_THRESHOLD: f64 = 0.4;

/// A single classifier output. Lists of these arrive ordered by descending score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub score: f64,
}

impl Prediction {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Rank-0 label is confident enough; carries the normalized label.
    AutoConfirmed(String),
    /// No detection, or the best score is below the threshold.
    NeedsDisambiguation,
}

impl GateDecision {
    pub fn auto_label(&self) -> Option<&str> {
        match self {
            GateDecision::AutoConfirmed(label) => Some(label),
            GateDecision::NeedsDisambiguation => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceGate {
    pub threshold: f64,
}

impl Default for ConfidenceGate {
    fn default() -> Self {
        Self {
            threshold: AUTO_ACCEPT_THRESHOLD,
        }
    }
}

impl ConfidenceGate {
    /// Decides whether the rank-0 prediction can be accepted as-is.
    ///
    /// Only rank 0 is inspected; ordering is the classifier's responsibility. An empty list
    /// means nothing was detected and always needs disambiguation, as does a rank-0 label
    /// that normalizes to nothing.
    pub fn decide(&self, predictions: &[Prediction]) -> GateDecision {
        let Some(top) = predictions.first() else {
            return GateDecision::NeedsDisambiguation;
        };

        let label = normalize_label(&top.label);
        // NaN scores fail this comparison and fall through to disambiguation.
        if !label.is_empty() && top.score >= self.threshold {
            GateDecision::AutoConfirmed(label)
        } else {
            GateDecision::NeedsDisambiguation
        }
    }
}
