use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const ENERGY: &str = "energy";
pub const PROTEIN: &str = "protein";
pub const CARBOHYDRATE: &str = "carbohydrate";
pub const FAT: &str = "fat";

/// Nutrient amounts for one `(label, grams)` lookup, as returned by the nutrition service.
///
/// Canonical macros live under [`ENERGY`], [`PROTEIN`], [`CARBOHYDRATE`] and [`FAT`]; any
/// other nutrient the service reports is kept under its own name. A profile is never scaled
/// locally: a different portion means a new lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionProfile {
    pub nutrients: BTreeMap<String, f64>,
}

impl NutritionProfile {
    pub fn with(mut self, name: &str, amount: f64) -> Self {
        self.nutrients.insert(name.to_string(), amount);
        self
    }

    /// Amount for `name`, or 0 when the service did not report it.
    pub fn amount(&self, name: &str) -> f64 {
        self.nutrients
            .get(name)
            .copied()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }

    pub fn energy_kcal(&self) -> f64 {
        self.amount(ENERGY)
    }

    pub fn protein_g(&self) -> f64 {
        self.amount(PROTEIN)
    }

    pub fn carbohydrate_g(&self) -> f64 {
        self.amount(CARBOHYDRATE)
    }

    pub fn fat_g(&self) -> f64 {
        self.amount(FAT)
    }

    pub fn is_empty(&self) -> bool {
        self.nutrients.is_empty()
    }

    /// Macros rounded to whole units, the form used for display, persistence and sync.
    pub fn rounded_macros(&self) -> RoundedMacros {
        RoundedMacros {
            calories: round_amount(self.energy_kcal()),
            protein_g: round_amount(self.protein_g()),
            carbs_g: round_amount(self.carbohydrate_g()),
            fat_g: round_amount(self.fat_g()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundedMacros {
    pub calories: i64,
    pub protein_g: i64,
    pub carbs_g: i64,
    pub fat_g: i64,
}

pub fn round_amount(value: f64) -> i64 {
    if value.is_finite() {
        value.round() as i64
    } else {
        0
    }
}
