use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use serde::Serialize;
use std::borrow::Cow;
use std::path::Path;
use tracing::{debug, info};

const NAME_COL: &str = "Name";
const KCAL_COL: &str = "kcal";
const PROTEIN_COL: &str = "Protein (g)";
const CARB_COL: &str = "Carbohydrate (g)";
const FAT_COL: &str = "Fat (g)";

/// One serving of a reference meal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealTemplate {
    pub name: Cow<'static, str>,
    pub kcal: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

impl MealTemplate {
    pub const fn preset(name: &'static str, kcal: f64, protein_g: f64, carbs_g: f64, fat_g: f64) -> Self {
        Self {
            name: Cow::Borrowed(name),
            kcal,
            protein_g,
            carbs_g,
            fat_g,
        }
    }
}

pub static DEFAULT_MEALS: [MealTemplate; 6] = [
    MealTemplate::preset("Chicken + Rice", 550.0, 40.0, 60.0, 12.0),
    MealTemplate::preset("Egg Omelette + Toast", 420.0, 25.0, 30.0, 20.0),
    MealTemplate::preset("Dal + Roti", 480.0, 22.0, 75.0, 10.0),
    MealTemplate::preset("Paneer Bowl", 520.0, 35.0, 25.0, 28.0),
    MealTemplate::preset("Greek Yogurt + Fruit", 300.0, 20.0, 35.0, 6.0),
    MealTemplate::preset("Protein Shake", 250.0, 30.0, 10.0, 5.0),
];

pub fn default_catalog() -> Vec<MealTemplate> {
    DEFAULT_MEALS.to_vec()
}

fn column(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| anyhow!("Column '{}' not found", name))
}

fn parse_amount(record: &csv::StringRecord, idx: usize, col: &str, row: usize) -> Result<f64> {
    let raw = record.get(idx).unwrap_or("").trim();
    let value: f64 = raw
        .parse()
        .with_context(|| format!("Invalid '{}' value '{}' at row {}", col, raw, row))?;
    if !value.is_finite() || value < 0.0 {
        return Err(anyhow!("'{}' must be a non-negative number at row {}, got {}", col, row, raw));
    }
    Ok(value)
}

/// Loads meal templates from a CSV file with the columns
/// `Name,kcal,Protein (g),Carbohydrate (g),Fat (g)`.
///
/// Rows with an empty name are skipped. Row numbers in errors count the header as row 1.
pub fn load_meal_catalog(csv_path: &Path) -> Result<Vec<MealTemplate>> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open meal catalog at {:?}", csv_path))?;
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);

    let headers = rdr.headers()?.clone();
    let name_idx = column(&headers, NAME_COL)?;
    let kcal_idx = column(&headers, KCAL_COL)?;
    let protein_idx = column(&headers, PROTEIN_COL)?;
    let carb_idx = column(&headers, CARB_COL)?;
    let fat_idx = column(&headers, FAT_COL)?;

    let mut catalog = Vec::new();
    for (row_index, result) in rdr.records().enumerate() {
        let row = row_index + 2;
        let record = result.with_context(|| format!("Failed to read record at row {}", row))?;

        let name = record.get(name_idx).unwrap_or("").trim().to_string();
        if name.is_empty() {
            debug!(row, "skipping catalog row without a name");
            continue;
        }

        let kcal = parse_amount(&record, kcal_idx, KCAL_COL, row)?;
        if kcal == 0.0 {
            return Err(anyhow!("'{}' must be positive at row {} ({})", KCAL_COL, row, name));
        }

        catalog.push(MealTemplate {
            name: Cow::Owned(name),
            kcal,
            protein_g: parse_amount(&record, protein_idx, PROTEIN_COL, row)?,
            carbs_g: parse_amount(&record, carb_idx, CARB_COL, row)?,
            fat_g: parse_amount(&record, fat_idx, FAT_COL, row)?,
        });
    }

    if catalog.is_empty() {
        return Err(anyhow!("No meal templates loaded from {:?}", csv_path));
    }

    info!(count = catalog.len(), path = %csv_path.display(), "meal catalog loaded");
    Ok(catalog)
}
