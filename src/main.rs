use anyhow::{Context, Result};
use nutri_scan::api_connection::{MealStoreClient, ScanApiClient};
use nutri_scan::cli::{parse_args, Command, ScanArgs, SuggestArgs};
use nutri_scan::config::ScanConfig;
use nutri_scan::optim::{default_catalog, load_meal_catalog, MacroTotals, MealPlanner};
use nutri_scan::recognition::session::{PersistOutcome, RecognitionResult};
use nutri_scan::recognition::{
    ImageData, Portion, RecognitionSession, ScanWorkflow, SelectedImage, SessionState, UserId,
};
use nutri_scan::sync::HealthConnectBridge;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn print_result(result: &RecognitionResult) {
    println!("\nCandidates:");
    for candidate in result.candidates.iter() {
        println!("  {:<30} {:>3}%", candidate.label, candidate.percent());
    }
    if let (Some(label), Some(macros)) = (&result.selected_label, result.macros()) {
        println!("\nConfirmed: {} ({} g)", label, result.grams);
        println!(
            "  {} kcal | protein {} g | carbs {} g | fat {} g",
            macros.calories, macros.protein_g, macros.carbs_g, macros.fat_g
        );
    }
}

async fn run_scan(config: &ScanConfig, args: ScanArgs) -> Result<()> {
    let portion = Portion::new(args.grams.unwrap_or(config.default_grams))?;
    let api = Arc::new(ScanApiClient::new(&config.api_url, config.timeout())?);
    let mut workflow = ScanWorkflow::new(
        RecognitionSession::new(portion, config.top_k),
        api.clone(),
        api,
    );
    if let Some(store) = &config.meal_store {
        let client = MealStoreClient::new(
            &store.url,
            &store.api_key,
            store.access_token.clone(),
            config.timeout(),
        )?;
        workflow = workflow.with_meal_store(Arc::new(client));
    }
    if let Some(url) = &config.health_bridge_url {
        workflow = workflow.with_health_sync(Arc::new(HealthConnectBridge::new(url, config.timeout())?));
    }

    let image = ImageData::from_path(&args.image).await?;
    workflow.select_image(SelectedImage::new(image));

    println!("Analyzing {} at {} g...", args.image.display(), portion.grams());
    workflow.analyze().await?;

    if let Some(pick) = &args.pick {
        let offered = workflow
            .session()
            .result()
            .is_some_and(|r| r.candidates.contains(pick));
        if !offered {
            println!("'{}' was not among the candidates, looking it up anyway.", pick);
        }
        workflow.choose_label(pick).await?;
    }

    let session = workflow.session();
    if let Some(error) = &session.messages().error {
        eprintln!("Error: {}", error);
    }
    if let Some(result) = session.result() {
        print_result(result);
    }
    if session.state() != SessionState::Confirmed {
        if session.needs_pick() {
            println!("\nLow confidence. Re-run with --pick <label> to choose one of the candidates.");
        }
        return Ok(());
    }

    if args.save {
        let user = config.user_id.clone().and_then(UserId::new);
        match workflow.persist(user.as_ref(), args.image_ref.clone()).await {
            Ok(PersistOutcome::Saved) => println!("\nSaved to Dashboard."),
            Ok(outcome) => warn!(?outcome, "meal was not saved"),
            Err(e) => eprintln!("\nNot saved: {}", e),
        }
        if let Some(error) = &workflow.session().messages().error {
            eprintln!("Error: {}", error);
        }
    }

    if args.sync {
        match workflow.sync().await {
            Ok(()) => println!("\nSent to Health Connect."),
            Err(e) => eprintln!("\n{}", e),
        }
    }

    Ok(())
}

fn run_suggest(config: &ScanConfig, args: SuggestArgs) -> Result<()> {
    let catalog = match args.catalog.as_ref().or(config.meal_catalog_csv.as_ref()) {
        Some(path) => load_meal_catalog(path)
            .with_context(|| format!("Failed to load meal catalog '{}'", path.display()))?,
        None => default_catalog(),
    };

    let mut planner = MealPlanner::new(catalog);
    planner.set_target(MacroTotals::new(
        args.target_kcal,
        args.target_protein,
        args.target_carbs,
        args.target_fat,
    ));
    planner.set_consumed(MacroTotals::new(
        args.eaten_kcal,
        args.eaten_protein,
        args.eaten_carbs,
        args.eaten_fat,
    ));

    let remaining = planner.remaining();
    println!(
        "Remaining today: {:.0} kcal | protein {:.0} g | carbs {:.0} g | fat {:.0} g",
        remaining.calories, remaining.protein_g, remaining.carbs_g, remaining.fat_g
    );

    match planner.current_suggestion() {
        Some(suggestion) => {
            println!(
                "\nSuggested: {} x{:.2}",
                suggestion.template.name, suggestion.factor
            );
            println!(
                "  {} kcal | protein {} g | carbs {} g | fat {} g",
                suggestion.scaled.calories,
                suggestion.scaled.protein_g,
                suggestion.scaled.carbs_g,
                suggestion.scaled.fat_g
            );
        }
        None => println!("\nNo meal templates to suggest from."),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = parse_args();
    let config = ScanConfig::from_env().context("Failed to load configuration")?;
    info!(api_url = %config.api_url, "configuration loaded");

    match cli.command {
        Command::Scan(args) => run_scan(&config, args).await,
        Command::Suggest(args) => run_suggest(&config, args),
    }
}
