use serde::Serialize;
use tracing::debug;

use crate::nutrition::{round_amount, RoundedMacros};
use crate::optim::catalog::{default_catalog, MealTemplate};
use crate::optim::nutri_eval::score;
use crate::optim::targets::{MacroTotals, DEFAULT_DAILY_TARGET};

pub const MIN_FACTOR: f64 = 0.5;
pub const MAX_FACTOR: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub template: MealTemplate,
    pub score: f64,
    /// Portion multiplier, within `[MIN_FACTOR, MAX_FACTOR]`.
    pub factor: f64,
    /// Template macros times `factor`, each rounded on its own. The scaled calories can
    /// differ by a unit or two from what the scaled grams would imply.
    pub scaled: RoundedMacros,
}

/// Picks the template that best closes `remaining` and sizes it to the remaining calories.
///
/// Ties keep the earliest template in catalog order. Returns `None` for an empty catalog.
pub fn suggest(remaining: &MacroTotals, catalog: &[MealTemplate]) -> Option<Suggestion> {
    let remaining = remaining.sanitized();

    let mut best: Option<(&MealTemplate, f64)> = None;
    for meal in catalog {
        let s = score(&remaining, meal);
        if best.map_or(true, |(_, best_score)| s < best_score) {
            best = Some((meal, s));
        }
    }
    let (template, best_score) = best?;

    let factor = scale_factor(remaining.calories, template.kcal);
    debug!(meal = %template.name, score = best_score, factor, "meal suggestion computed");

    Some(Suggestion {
        template: template.clone(),
        score: best_score,
        factor,
        scaled: RoundedMacros {
            calories: round_amount(template.kcal * factor),
            protein_g: round_amount(template.protein_g * factor),
            carbs_g: round_amount(template.carbs_g * factor),
            fat_g: round_amount(template.fat_g * factor),
        },
    })
}

fn scale_factor(remaining_kcal: f64, template_kcal: f64) -> f64 {
    if remaining_kcal > 0.0 {
        let raw = remaining_kcal / template_kcal;
        if raw.is_nan() {
            1.0
        } else {
            raw.clamp(MIN_FACTOR, MAX_FACTOR)
        }
    } else {
        1.0
    }
}

/// Daily target, what was eaten so far, and the catalog to pick from.
#[derive(Debug, Clone)]
pub struct MealPlanner {
    target: MacroTotals,
    consumed: MacroTotals,
    catalog: Vec<MealTemplate>,
}

impl Default for MealPlanner {
    fn default() -> Self {
        Self::new(default_catalog())
    }
}

impl MealPlanner {
    pub fn new(catalog: Vec<MealTemplate>) -> Self {
        Self {
            target: DEFAULT_DAILY_TARGET,
            consumed: MacroTotals::default(),
            catalog,
        }
    }

    pub fn set_target(&mut self, target: MacroTotals) {
        self.target = target.sanitized();
    }

    pub fn set_consumed(&mut self, consumed: MacroTotals) {
        self.consumed = consumed.sanitized();
    }

    pub fn target(&self) -> &MacroTotals {
        &self.target
    }

    pub fn consumed(&self) -> &MacroTotals {
        &self.consumed
    }

    pub fn remaining(&self) -> MacroTotals {
        self.target.remaining(&self.consumed)
    }

    /// Recomputed on every call; nothing is cached between target or intake changes.
    pub fn current_suggestion(&self) -> Option<Suggestion> {
        suggest(&self.remaining(), &self.catalog)
    }
}
