use crate::optim::catalog::MealTemplate;
use crate::optim::targets::MacroTotals;

pub const KCAL_WEIGHT: f64 = 1.0;
pub const PROTEIN_WEIGHT: f64 = 8.0;
pub const CARBS_WEIGHT: f64 = 3.0;
pub const FAT_WEIGHT: f64 = 6.0;

/// Weighted absolute distance between what remains for the day and one serving of `meal`.
///
/// Gram for gram, protein and fat deviations weigh more than calories.
///
/// # Arguments
/// * `remaining`: Macros still to eat today.
/// * `meal`: Candidate template, unscaled.
///
/// # Returns
/// The score; lower is a closer fit.
pub fn score(remaining: &MacroTotals, meal: &MealTemplate) -> f64 {
    (remaining.calories - meal.kcal).abs() * KCAL_WEIGHT
        + (remaining.protein_g - meal.protein_g).abs() * PROTEIN_WEIGHT
        + (remaining.carbs_g - meal.carbs_g).abs() * CARBS_WEIGHT
        + (remaining.fat_g - meal.fat_g).abs() * FAT_WEIGHT
}
