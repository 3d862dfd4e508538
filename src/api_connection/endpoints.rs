use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::nutrition::{NutritionProfile, CARBOHYDRATE, ENERGY, FAT, PROTEIN};
use crate::recognition::gate::Prediction;

pub const PREDICT_PATH: &str = "/predict-and-nutrition";
pub const NUTRITION_PATH: &str = "/nutrition";
pub const MEALS_TABLE_PATH: &str = "/rest/v1/meals";
pub const HEALTH_BRIDGE_MEALS_PATH: &str = "/meals";

/// Nutrient names used by the nutrition service, mapped to canonical profile keys.
pub const SERVICE_NUTRIENT_NAMES: &[(&str, &str)] = &[
    ("Energy", ENERGY),
    ("Protein", PROTEIN),
    ("Carbohydrate, by difference", CARBOHYDRATE),
    ("Total lipid (fat)", FAT),
];

#[derive(Debug, Deserialize, Clone)]
pub struct PredictResponse {
    #[serde(default)]
    pub predictions: Vec<Prediction>,
    /// The service also resolves nutrition for its own top guess; the session ignores it and
    /// issues its own lookup once a label is confirmed.
    #[serde(default)]
    pub used_query: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NutritionResponse {
    #[serde(default)]
    pub nutrients_for_grams: HashMap<String, Value>,
}

impl NutritionResponse {
    /// Converts the service payload into a profile. Non-numeric amounts are dropped.
    pub fn into_profile(self) -> NutritionProfile {
        let mut profile = NutritionProfile::default();
        for (name, value) in self.nutrients_for_grams {
            let Some(amount) = value.as_f64() else {
                continue;
            };
            let key = SERVICE_NUTRIENT_NAMES
                .iter()
                .find(|(service_name, _)| *service_name == name)
                .map(|(_, canonical)| canonical.to_string())
                .unwrap_or(name);
            profile.nutrients.insert(key, amount);
        }
        profile
    }
}

/// Row written to the `meals` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealRecord {
    pub user_id: String,
    pub title: String,
    pub detected_label: String,
    pub grams: f64,
    pub calories: i64,
    pub protein_g: i64,
    pub carbs_g: i64,
    pub fat_g: i64,
    /// Storage path of an already uploaded image, never a public URL.
    pub image_url: Option<String>,
}

/// Payload accepted by the Health Connect bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMeal {
    pub time: DateTime<Utc>,
    pub kcal: i64,
    pub protein: i64,
    pub carbs: i64,
    pub fat: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    pub detail: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nutrition_response_maps_service_names() {
        let response: NutritionResponse = serde_json::from_value(json!({
            "nutrients_for_grams": {
                "Energy": 532.0,
                "Protein": 22.4,
                "Carbohydrate, by difference": 66.0,
                "Total lipid (fat)": 19.5,
                "Fiber, total dietary": 4.1,
                "Sugars": null
            }
        }))
        .unwrap();

        let profile = response.into_profile();
        assert_eq!(profile.energy_kcal(), 532.0);
        assert_eq!(profile.protein_g(), 22.4);
        assert_eq!(profile.carbohydrate_g(), 66.0);
        assert_eq!(profile.fat_g(), 19.5);
        assert_eq!(profile.amount("Fiber, total dietary"), 4.1);
        assert!(!profile.nutrients.contains_key("Sugars"));
    }

    #[test]
    fn test_nutrition_response_missing_map_is_empty() {
        let response: NutritionResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.into_profile().is_empty());
    }

    #[test]
    fn test_predict_response_tolerates_extra_fields() {
        let response: PredictResponse = serde_json::from_value(json!({
            "predictions": [{"label": "pizza", "score": 0.91}],
            "used_query": "pizza",
            "nutrition": {"nutrients_for_grams": {"Energy": 532.0}}
        }))
        .unwrap();
        assert_eq!(response.predictions.len(), 1);
        assert_eq!(response.used_query.as_deref(), Some("pizza"));
    }

    #[test]
    fn test_meal_record_serializes_null_image() {
        let record = MealRecord {
            user_id: "u-1".to_string(),
            title: "pizza".to_string(),
            detected_label: "pizza".to_string(),
            grams: 200.0,
            calories: 532,
            protein_g: 22,
            carbs_g: 66,
            fat_g: 20,
            image_url: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["image_url"], Value::Null);
        assert_eq!(value["calories"], json!(532));
    }
}
