use serde::Serialize;

use crate::recognition::gate::Prediction;
use crate::recognition::labels::normalize_label;

/// Number of alternatives offered to the user when disambiguating.
pub const MAX_CANDIDATES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub label: String,
    pub score: f64,
}

impl Candidate {
    /// Score as a whole percentage for chip display.
    pub fn percent(&self) -> u32 {
        (self.score * 100.0).round().clamp(0.0, 100.0) as u32
    }
}

/// Ranked, normalized alternatives for one analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CandidateSet {
    candidates: Vec<Candidate>,
}

impl CandidateSet {
    /// Keeps the top [`MAX_CANDIDATES`] predictions in classifier order.
    pub fn present(predictions: &[Prediction]) -> Self {
        let candidates = predictions
            .iter()
            .take(MAX_CANDIDATES)
            .map(|p| Candidate {
                label: normalize_label(&p.label),
                score: p.score,
            })
            .collect();
        Self { candidates }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn top(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    pub fn contains(&self, label: &str) -> bool {
        let label = normalize_label(label);
        self.candidates.iter().any(|c| c.label == label)
    }
}
