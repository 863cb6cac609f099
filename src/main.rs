mod ai;
mod analyzer;
mod chart;
mod cli;
mod collector;
mod config;
mod dataset;
mod error;

use crate::analyzer::cleaner::{CleanedRecord, clean_activities};
use crate::analyzer::report::{self, format_pace_clock};
use crate::analyzer::{Analysis, ForecastReport};
use crate::cli::onboard::{AuthArgs, run_auth};
use crate::cli::{AiCommands, Cli, Commands, ConfigCommands};
use crate::config::{Config, parse_holdout_fraction};
use crate::error::PipelineError;
use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const PREVIEW_ROWS: usize = 5;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Auth {
            code,
            client_id,
            client_secret,
        } => {
            let config = load_or_default_config()?;
            run_auth(
                config,
                AuthArgs {
                    code,
                    client_id,
                    client_secret,
                },
            )
        }
        Commands::Fetch { lookback } => {
            let config = load_or_default_config()?;
            handle_fetch(&config, lookback).map(|_| ())
        }
        Commands::Analyze { no_ai } => {
            let config = load_or_default_config()?;
            handle_analyze(&config, !no_ai).map(|_| ())
        }
        Commands::Forecast { holdout } => {
            let config = load_or_default_config()?;
            let holdout_fraction = holdout
                .as_deref()
                .map(parse_holdout_fraction)
                .transpose()?
                .unwrap_or(config.holdout_fraction);
            let analysis = analyze_dataset(&config)?;
            handle_forecast(&config, &analysis, holdout_fraction).map(|_| ())
        }
        Commands::Run { no_ai } => handle_run(!no_ai),
        Commands::Config { command } => handle_config_command(command),
        Commands::Doctor => handle_doctor(),
        Commands::Ai { command } => handle_ai_command(command),
    }
}

fn handle_fetch(config: &Config, lookback: Option<u32>) -> Result<Vec<CleanedRecord>> {
    let mut config = config.clone();
    if let Some(value) = lookback {
        config.lookback_activities = value.max(1);
    }

    let activities = collector::fetch_recent_activities(&config)?;
    if activities.is_empty() {
        return Err(PipelineError::EmptyDataset(
            "Strava returned no activities in the lookback window".to_string(),
        )
        .into());
    }

    let outcome = clean_activities(&activities);
    for (name, issue) in &outcome.skipped_invalid {
        warn!(activity = %name, "Skipping activity: {issue}");
    }
    info!(
        fetched = activities.len(),
        runs = outcome.records.len(),
        skipped_non_run = outcome.skipped_non_run,
        skipped_invalid = outcome.skipped_invalid.len(),
        "Cleaned activities"
    );

    if outcome.records.is_empty() {
        return Err(PipelineError::EmptyDataset(format!(
            "none of the {} fetched activities is a usable run",
            activities.len()
        ))
        .into());
    }

    dataset::write_dataset(&config.dataset_path, &outcome.records)?;

    println!(
        "Dataset written: {} ({} runs)",
        config.dataset_path.display(),
        outcome.records.len()
    );
    print_preview(&outcome.records);

    Ok(outcome.records)
}

fn handle_analyze(config: &Config, use_ai: bool) -> Result<Analysis> {
    let analysis = analyze_dataset(config)?;
    let summary = report::build_summary(&analysis);
    let summary_json = report::summary_json(&summary)?;

    println!("{summary_json}");

    let recommendation = coach(config, use_ai, &summary_json);
    if let Some(text) = recommendation.as_deref() {
        println!("\nCoach recommendation\n{text}");
    }

    let saved = report::save_report_files(
        &analysis,
        &summary,
        recommendation.as_deref(),
        Local::now().date_naive(),
        &config.output_dir,
    )?;
    let charts = chart::render_charts(
        &analysis.weeks,
        &analysis.correlations,
        &config.output_dir,
    )?;

    println!("\nReport generated");
    println!("- Markdown: {}", saved.markdown_path.display());
    println!("- JSON: {}", saved.json_path.display());
    println!("- Pace trend chart: {}", charts.pace_trend.display());
    println!(
        "- Speed correlation chart: {}",
        charts.speed_correlation.display()
    );

    Ok(analysis)
}

fn handle_forecast(
    config: &Config,
    analysis: &Analysis,
    holdout_fraction: f64,
) -> Result<ForecastReport> {
    let forecast = analyzer::forecast(analysis, holdout_fraction)?;
    let path = report::save_forecast(&forecast, &config.output_dir)?;

    let model = &forecast.model;
    println!("Pace model (next week's pace)");
    println!(
        "- next_pace = {:.4} + {:.4} * pace + {:.4} * runs",
        model.intercept, model.pace_coefficient, model.volume_coefficient
    );
    println!(
        "- training weeks: {}, holdout weeks: {}, holdout MAE: {}",
        model.training_rows,
        model.holdout_rows,
        report::format_optional(model.holdout_mae, 3)
    );

    if let Some(next) = forecast.forecast.as_ref() {
        println!(
            "- {}-W{:02}: {} /km over {} runs -> predicted {} /km ({:?})",
            next.year,
            next.week,
            format_pace_clock(next.current_pace),
            next.current_runs,
            format_pace_clock(next.predicted_pace),
            next.trend
        );
    }
    println!("- Saved: {}", path.display());

    Ok(forecast)
}

fn handle_run(use_ai: bool) -> Result<()> {
    let config = load_or_default_config()?;

    handle_fetch(&config, None)?;
    let analysis = handle_analyze(&config, use_ai)?;

    println!();
    match handle_forecast(&config, &analysis, config.holdout_fraction) {
        Ok(_) => Ok(()),
        Err(error) => match error.downcast_ref::<PipelineError>() {
            Some(PipelineError::InsufficientData { .. }) => {
                warn!("Skipping forecast: {error}");
                Ok(())
            }
            _ => Err(error),
        },
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.ensure_directories()?;
            config.save()?;

            let masked = if is_secret_key(&key) {
                "***hidden***".to_string()
            } else {
                value
            };
            println!("Config saved: {key} = {masked}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_or_default_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path();
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing".to_string());
    }

    let config = load_or_default_config()?;

    match collector::resolve_access_token(&config) {
        Ok(_) => println!("[OK] Strava access token available"),
        Err(error) => {
            println!("[WARN] Strava access token unavailable: {error}");
            issues.push("strava token missing".to_string());
        }
    }

    if config.dataset_path.exists() {
        match dataset::read_dataset(&config.dataset_path) {
            Ok(load) => println!(
                "[OK] dataset readable: {} ({} runs, {} skipped rows)",
                config.dataset_path.display(),
                load.records.len(),
                load.skipped_rows
            ),
            Err(error) => {
                println!("[WARN] dataset unreadable: {error:#}");
                issues.push("dataset unreadable".to_string());
            }
        }
    } else {
        println!(
            "[WARN] dataset missing: {} (run `pacelab fetch`)",
            config.dataset_path.display()
        );
        issues.push("dataset missing".to_string());
    }

    if config.output_dir.exists() {
        println!("[OK] output dir exists: {}", config.output_dir.display());
    } else {
        println!("[WARN] output dir missing: {}", config.output_dir.display());
        issues.push("output dir missing".to_string());
    }

    if config.ai_enabled {
        if ai::has_api_key(&config) {
            println!("[OK] AI API key is configured");
        } else {
            println!("[WARN] AI is enabled but API key is missing");
            issues.push("ai api key missing".to_string());
        }
    } else {
        println!("[OK] AI feature disabled");
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

fn handle_ai_command(command: AiCommands) -> Result<()> {
    match command {
        AiCommands::Test {
            key,
            base_url,
            model,
        } => {
            let mut config = load_or_default_config()?;

            if let Some(value) = key {
                config.ai_api_key = Some(value);
            }
            if let Some(value) = base_url {
                config.ai_api_base_url = value;
            }
            if let Some(value) = model {
                config.ai_model = value;
            }

            let response = ai::test_connection(&config)?;
            println!("AI API connection successful");
            println!("{response}");

            Ok(())
        }
    }
}

fn analyze_dataset(config: &Config) -> Result<Analysis> {
    let load = dataset::read_dataset(&config.dataset_path)?;
    if load.skipped_rows > 0 {
        warn!(
            skipped = load.skipped_rows,
            "Some dataset rows were skipped"
        );
    }

    Ok(analyzer::analyze(&load.records)?)
}

/// Returns the coaching text, or `None` when generation is off or fails.
fn coach(config: &Config, use_ai: bool, summary_json: &str) -> Option<String> {
    if !use_ai || !config.ai_enabled {
        info!("AI coaching disabled");
        return None;
    }
    if !ai::has_api_key(config) {
        warn!("AI API key is missing. Skipping coach recommendation");
        return None;
    }

    ai::coach_recommendation(config, summary_json)
        .inspect_err(|error| warn!("Coach recommendation failed: {error:#}"))
        .ok()
}

fn print_preview(records: &[CleanedRecord]) {
    println!(
        "{:<12} {:<28} {:>8} {:>9} {:>7} {:>6}",
        "date", "name", "km", "minutes", "pace", "hr"
    );
    for record in records.iter().take(PREVIEW_ROWS) {
        println!(
            "{:<12} {:<28} {:>8.2} {:>9.1} {:>7} {:>6}",
            record.date.format("%Y-%m-%d").to_string(),
            record.name.chars().take(28).collect::<String>(),
            record.distance_km,
            record.duration_min,
            format_pace_clock(record.pace_decimal),
            format_heartrate(record.average_heartrate)
        );
    }
}

/// Absent heart rate prints as `-` so it never reads as a zero reading.
fn format_heartrate(average_heartrate: Option<f64>) -> String {
    average_heartrate
        .map(|value| format!("{value:.0}"))
        .unwrap_or_else(|| "-".to_string())
}

fn is_secret_key(key: &str) -> bool {
    ["token", "secret", "api_key"]
        .iter()
        .any(|marker| key.contains(marker))
}

fn load_or_default_config() -> Result<Config> {
    if Config::config_path().exists() {
        return Config::load();
    }

    let config = Config::default();
    config.ensure_directories()?;
    config.save()?;
    Ok(config)
}
