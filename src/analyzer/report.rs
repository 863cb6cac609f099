use crate::analyzer::classifier::{WorkoutType, most_frequent_workout};
use crate::analyzer::{Analysis, ForecastReport};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const UNDEFINED: &str = "undefined";
const SUMMARY_FILE: &str = "summary.json";
const MARKDOWN_FILE: &str = "report.md";
const FORECAST_FILE: &str = "forecast.json";

/// The structure handed to the coaching model. Field names are part of the
/// prompt contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub user_profile: String,
    pub goal: String,
    pub personalized_pace_zones: PaceZoneSummary,
    pub training_summary: TrainingSummary,
    pub core_analysis: CoreAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaceZoneSummary {
    pub q1_speed_limit: String,
    pub q3_easy_limit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub total_runs: usize,
    pub total_distance_km: String,
    pub total_duration_min: String,
    pub most_frequent_workout: String,
    pub avg_pace_change_vs_prev_period: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreAnalysis {
    pub correlation_speed_runs_vs_pace_change: String,
    pub correlation_easy_runs_vs_pace_change: String,
}

#[derive(Debug)]
pub struct SavedReport {
    pub markdown_path: PathBuf,
    pub json_path: PathBuf,
}

pub fn build_summary(analysis: &Analysis) -> AnalysisSummary {
    let total_distance_km = analysis
        .classified
        .iter()
        .map(|entry| entry.record.distance_km)
        .sum::<f64>();
    let total_duration_min = analysis
        .classified
        .iter()
        .map(|entry| entry.record.duration_min)
        .sum::<f64>();

    AnalysisSummary {
        user_profile: "Beginner runner".to_string(),
        goal: "Data-driven pace improvement".to_string(),
        personalized_pace_zones: PaceZoneSummary {
            q1_speed_limit: format!("{:.2} min/km", analysis.zones.q1),
            q3_easy_limit: format!("{:.2} min/km", analysis.zones.q3),
        },
        training_summary: TrainingSummary {
            total_runs: analysis.classified.len(),
            total_distance_km: format!("{total_distance_km:.2}"),
            total_duration_min: format!("{total_duration_min:.1}"),
            most_frequent_workout: most_frequent_workout(&analysis.classified)
                .map(|workout_type| workout_type.label().to_string())
                .unwrap_or_else(|| UNDEFINED.to_string()),
            avg_pace_change_vs_prev_period: format_optional(analysis.mean_pace_delta, 3),
        },
        core_analysis: CoreAnalysis {
            correlation_speed_runs_vs_pace_change: format_optional(
                analysis.correlations.speed_runs_vs_pace_delta,
                3,
            ),
            correlation_easy_runs_vs_pace_change: format_optional(
                analysis.correlations.easy_runs_vs_pace_delta,
                3,
            ),
        },
    }
}

pub fn summary_json(summary: &AnalysisSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("Failed to serialize analysis summary")
}

pub fn render_markdown(
    analysis: &Analysis,
    summary: &AnalysisSummary,
    recommendation: Option<&str>,
    generated_on: NaiveDate,
) -> String {
    let total_runs = analysis.classified.len();

    let zone_rows = [
        format!(
            "| {} | {} /km or faster |",
            WorkoutType::SpeedInterval,
            format_pace_clock(analysis.zones.q1)
        ),
        format!(
            "| {} | between {} and {} /km |",
            WorkoutType::TempoModerate,
            format_pace_clock(analysis.zones.q1),
            format_pace_clock(analysis.zones.q3)
        ),
        format!(
            "| {} | {} /km or slower |",
            WorkoutType::EasyRecovery,
            format_pace_clock(analysis.zones.q3)
        ),
    ]
    .join("\n");

    let distribution_rows = analysis
        .distribution
        .iter()
        .map(|(workout_type, count)| {
            let ratio = if total_runs == 0 {
                0.0
            } else {
                (*count as f64 / total_runs as f64) * 100.0
            };
            format!("| {workout_type} | {count} | {ratio:.0}% |")
        })
        .collect::<Vec<_>>()
        .join("\n");

    let weekly_rows = analysis
        .weeks
        .iter()
        .map(|week| {
            format!(
                "| {}-W{:02} | {} | {} | {} | {} | {} | {} |",
                week.year,
                week.week,
                week.total_runs,
                week.speed_runs,
                week.tempo_runs,
                week.easy_runs,
                format_pace_clock(week.avg_pace),
                format_optional(week.pace_delta, 3)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let recommendation_block = recommendation
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| "- No recommendation generated".to_string());

    format!(
        "# Running Analysis Report - {}\n\n## Summary\n- Runs analysed: {}\n- Total distance: {} km\n- Total moving time: {} min\n- Most frequent workout: {}\n- Average weekly pace change: {} min/km (negative means faster)\n\n## Personal Pace Zones\n| Zone | Pace |\n|------|------|\n{}\n\n## Workout Distribution\n| Type | Runs | Ratio |\n|------|------|-------|\n{}\n\n## Weekly Trend\n| Week | Runs | Speed | Tempo | Easy | Avg pace | Pace delta |\n|------|------|-------|-------|------|----------|------------|\n{}\n\n## Correlation With Next Week's Pace Change\n- Speed/interval runs: r = {} ({} weekly pairs)\n- Easy/recovery runs: r = {} ({} weekly pairs)\n\n## Coach Recommendation\n{}\n",
        generated_on.format("%Y-%m-%d"),
        summary.training_summary.total_runs,
        summary.training_summary.total_distance_km,
        summary.training_summary.total_duration_min,
        summary.training_summary.most_frequent_workout,
        summary.training_summary.avg_pace_change_vs_prev_period,
        zone_rows,
        distribution_rows,
        weekly_rows,
        summary.core_analysis.correlation_speed_runs_vs_pace_change,
        analysis.correlations.speed_pairs,
        summary.core_analysis.correlation_easy_runs_vs_pace_change,
        analysis.correlations.easy_pairs,
        recommendation_block
    )
}

pub fn save_report_files(
    analysis: &Analysis,
    summary: &AnalysisSummary,
    recommendation: Option<&str>,
    generated_on: NaiveDate,
    output_dir: &Path,
) -> Result<SavedReport> {
    fs::create_dir_all(output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            output_dir.display()
        )
    })?;

    let markdown_path = output_dir.join(MARKDOWN_FILE);
    let json_path = output_dir.join(SUMMARY_FILE);

    fs::write(
        &markdown_path,
        render_markdown(analysis, summary, recommendation, generated_on),
    )
    .with_context(|| {
        format!(
            "Failed to write Markdown report: {}",
            markdown_path.display()
        )
    })?;

    fs::write(&json_path, summary_json(summary)?)
        .with_context(|| format!("Failed to write JSON summary: {}", json_path.display()))?;

    Ok(SavedReport {
        markdown_path,
        json_path,
    })
}

pub fn save_forecast(report: &ForecastReport, output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            output_dir.display()
        )
    })?;

    let path = output_dir.join(FORECAST_FILE);
    let content =
        serde_json::to_string_pretty(report).context("Failed to serialize forecast report")?;
    fs::write(&path, content)
        .with_context(|| format!("Failed to write forecast report: {}", path.display()))?;

    Ok(path)
}

pub fn format_optional(value: Option<f64>, precision: usize) -> String {
    value
        .filter(|value| value.is_finite())
        .map(|value| format!("{value:.precision$}"))
        .unwrap_or_else(|| UNDEFINED.to_string())
}

/// Decimal minutes per km as `m:ss`.
pub fn format_pace_clock(pace_decimal: f64) -> String {
    if !pace_decimal.is_finite() || pace_decimal < 0.0 {
        return UNDEFINED.to_string();
    }

    let total_seconds = (pace_decimal * 60.0).round() as u64;
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}
