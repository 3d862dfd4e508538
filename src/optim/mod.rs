pub mod catalog;
pub mod nutri_eval;
pub mod optimizer;
pub mod targets;

pub use catalog::{default_catalog, load_meal_catalog, MealTemplate, DEFAULT_MEALS};
pub use optimizer::{suggest, MealPlanner, Suggestion};
pub use targets::{MacroTotals, DEFAULT_DAILY_TARGET};
