use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Recognize a meal from a photo and log its macros", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Classify a food photo and resolve its nutrition
    Scan(ScanArgs),
    /// Suggest a meal that closes the rest of today's macro targets
    Suggest(SuggestArgs),
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Path to the food photo
    #[arg(short, long)]
    pub image: PathBuf,

    /// Portion weight in grams (defaults to NUTRISCAN_DEFAULT_GRAMS)
    #[arg(short, long)]
    pub grams: Option<f64>,

    /// Label to use when the classifier is unsure, or to override its guess
    #[arg(short, long)]
    pub pick: Option<String>,

    /// Save the confirmed meal to the meal store
    #[arg(long)]
    pub save: bool,

    /// Push the confirmed meal to the health bridge
    #[arg(long)]
    pub sync: bool,

    /// Storage path of an already uploaded copy of the image
    #[arg(long)]
    pub image_ref: Option<String>,
}

#[derive(Args, Debug)]
pub struct SuggestArgs {
    #[arg(long, default_value_t = 2000.0)]
    pub target_kcal: f64,
    #[arg(long, default_value_t = 120.0)]
    pub target_protein: f64,
    #[arg(long, default_value_t = 250.0)]
    pub target_carbs: f64,
    #[arg(long, default_value_t = 65.0)]
    pub target_fat: f64,

    #[arg(long, default_value_t = 0.0)]
    pub eaten_kcal: f64,
    #[arg(long, default_value_t = 0.0)]
    pub eaten_protein: f64,
    #[arg(long, default_value_t = 0.0)]
    pub eaten_carbs: f64,
    #[arg(long, default_value_t = 0.0)]
    pub eaten_fat: f64,

    /// CSV catalog of meal templates (defaults to MEAL_CATALOG_CSV, then the built-in set)
    #[arg(long)]
    pub catalog: Option<PathBuf>,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
