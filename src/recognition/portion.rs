use crate::recognition::error::SessionError;

/// Portion used when nothing else is configured.
pub const DEFAULT_GRAMS: f64 = 200.0;

/// A validated gram quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Portion(f64);

impl Portion {
    pub fn new(grams: f64) -> Result<Self, SessionError> {
        if grams.is_finite() && grams > 0.0 {
            Ok(Self(grams))
        } else {
            Err(SessionError::InvalidPortion(grams))
        }
    }

    pub fn grams(self) -> f64 {
        self.0
    }
}

impl Default for Portion {
    fn default() -> Self {
        Self(DEFAULT_GRAMS)
    }
}

/// Identity of a nutrition lookup. A response is only applied while its key is still the
/// one the session is waiting for.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupKey {
    pub label: String,
    pub grams: f64,
}

impl LookupKey {
    pub fn new(label: impl Into<String>, portion: Portion) -> Self {
        Self {
            label: label.into(),
            grams: portion.grams(),
        }
    }
}
