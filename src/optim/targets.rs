use serde::{Deserialize, Serialize};

/// Daily macro amounts: a target, what was eaten, or what remains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroTotals {
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

impl MacroTotals {
    pub const fn new(calories: f64, protein_g: f64, carbs_g: f64, fat_g: f64) -> Self {
        Self {
            calories,
            protein_g,
            carbs_g,
            fat_g,
        }
    }

    /// Replaces negative or non-finite entries with 0.
    pub fn sanitized(self) -> Self {
        fn clean(v: f64) -> f64 {
            if v.is_finite() && v > 0.0 {
                v
            } else {
                0.0
            }
        }
        Self {
            calories: clean(self.calories),
            protein_g: clean(self.protein_g),
            carbs_g: clean(self.carbs_g),
            fat_g: clean(self.fat_g),
        }
    }

    /// What is left of `self` (a target) after `consumed`, floored at 0 per macro.
    ///
    /// # Arguments
    /// * `consumed`: Totals already eaten today.
    ///
    /// # Returns
    /// Remaining macros, never negative.
    pub fn remaining(&self, consumed: &MacroTotals) -> MacroTotals {
        let target = self.sanitized();
        let consumed = consumed.sanitized();
        MacroTotals {
            calories: (target.calories - consumed.calories).max(0.0),
            protein_g: (target.protein_g - consumed.protein_g).max(0.0),
            carbs_g: (target.carbs_g - consumed.carbs_g).max(0.0),
            fat_g: (target.fat_g - consumed.fat_g).max(0.0),
        }
    }
}

/// Target used when the user has not set one.
pub const DEFAULT_DAILY_TARGET: MacroTotals = MacroTotals::new(2000.0, 120.0, 250.0, 65.0);
