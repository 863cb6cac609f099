pub mod classifier;
pub mod cleaner;
pub mod forecast;
pub mod report;
pub mod stats;
pub mod weekly;

use crate::analyzer::classifier::{
    ClassifiedRecord, PaceZones, WorkoutType, classify_records, workout_distribution,
};
use crate::analyzer::cleaner::CleanedRecord;
use crate::analyzer::forecast::{Forecast, ForecastModel, fit_forecast_model, forecast_next_week};
use crate::analyzer::weekly::{
    LaggedCorrelations, WeeklyAggregate, aggregate_weeks, lagged_correlations, mean_pace_delta,
};
use crate::error::PipelineError;
use serde::Serialize;

/// Everything derived from one dataset load.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub zones: PaceZones,
    pub classified: Vec<ClassifiedRecord>,
    pub distribution: Vec<(WorkoutType, usize)>,
    pub weeks: Vec<WeeklyAggregate>,
    pub correlations: LaggedCorrelations,
    pub mean_pace_delta: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastReport {
    pub model: ForecastModel,
    pub forecast: Option<Forecast>,
}

pub fn analyze(records: &[CleanedRecord]) -> Result<Analysis, PipelineError> {
    if records.is_empty() {
        return Err(PipelineError::EmptyDataset(
            "no valid runs to analyze".to_string(),
        ));
    }

    let zones = PaceZones::from_records(records)?;
    let classified = classify_records(records, &zones);
    let distribution = workout_distribution(&classified);
    let weeks = aggregate_weeks(&classified);
    let correlations = lagged_correlations(&weeks);
    let mean_pace_delta = mean_pace_delta(&weeks);

    Ok(Analysis {
        zones,
        classified,
        distribution,
        weeks,
        correlations,
        mean_pace_delta,
    })
}

pub fn forecast(
    analysis: &Analysis,
    holdout_fraction: f64,
) -> Result<ForecastReport, PipelineError> {
    let model = fit_forecast_model(&analysis.weeks, holdout_fraction)?;
    let forecast = forecast_next_week(&model, &analysis.weeks);

    Ok(ForecastReport { model, forecast })
}

#[cfg(test)]
mod tests {
    use super::{analyze, forecast};
    use crate::analyzer::classifier::WorkoutType;
    use crate::analyzer::cleaner::CleanedRecord;
    use crate::analyzer::report::{build_summary, render_markdown};
    use crate::error::PipelineError;
    use chrono::NaiveDate;

    fn run(day: u32, distance: f64, moving_time: f64) -> CleanedRecord {
        let start = NaiveDate::from_ymd_opt(2024, 1, day)
            .and_then(|date| date.and_hms_opt(7, 0, 0))
            .expect("valid datetime");
        CleanedRecord::derive(
            format!("Run {day}"),
            start,
            distance,
            moving_time,
            0.0,
            distance / moving_time,
            0.0,
            None,
        )
        .expect("valid record")
    }

    fn two_week_dataset() -> Vec<CleanedRecord> {
        vec![
            run(1, 5000.0, 1500.0),
            run(3, 5000.0, 1800.0),
            run(8, 10000.0, 3000.0),
            run(10, 10000.0, 3300.0),
        ]
    }

    #[test]
    fn two_weeks_end_to_end() {
        let records = two_week_dataset();

        let analysis = analyze(&records).expect("analysis");

        let paces = records
            .iter()
            .map(|record| record.pace_decimal)
            .collect::<Vec<_>>();
        assert_eq!(paces, vec![5.0, 6.0, 5.0, 5.5]);
        assert!((analysis.zones.q1 - 5.0).abs() < 1e-9);
        assert!((analysis.zones.q3 - 5.625).abs() < 1e-9);
        assert_eq!(
            analysis
                .classified
                .iter()
                .map(|entry| entry.workout_type)
                .collect::<Vec<_>>(),
            vec![
                WorkoutType::SpeedInterval,
                WorkoutType::EasyRecovery,
                WorkoutType::SpeedInterval,
                WorkoutType::TempoModerate,
            ]
        );

        assert_eq!(analysis.weeks.len(), 2);
        assert!((analysis.weeks[0].avg_pace - 5.5).abs() < 1e-9);
        assert!((analysis.weeks[1].avg_pace - 5.25).abs() < 1e-9);
        assert!((analysis.weeks[0].pace_delta.expect("delta") - (-0.25)).abs() < 1e-9);
        assert_eq!(analysis.weeks[1].pace_delta, None);
        assert_eq!(analysis.correlations.speed_pairs, 1);
        assert_eq!(analysis.correlations.speed_runs_vs_pace_delta, None);
    }

    #[test]
    fn summary_matches_prompt_contract() {
        let analysis = analyze(&two_week_dataset()).expect("analysis");

        let summary = build_summary(&analysis);
        let value = serde_json::to_value(&summary).expect("summary json");

        assert_eq!(value["personalized_pace_zones"]["q1_speed_limit"], "5.00 min/km");
        assert!(
            value["personalized_pace_zones"]["q3_easy_limit"]
                .as_str()
                .is_some_and(|limit| limit.starts_with("5.6") && limit.ends_with(" min/km"))
        );
        assert_eq!(value["training_summary"]["total_runs"], 4);
        assert_eq!(value["training_summary"]["total_distance_km"], "30.00");
        assert_eq!(
            value["training_summary"]["most_frequent_workout"],
            "SPEED/INTERVAL"
        );
        assert_eq!(
            value["training_summary"]["avg_pace_change_vs_prev_period"],
            "-0.250"
        );
        assert_eq!(
            value["core_analysis"]["correlation_speed_runs_vs_pace_change"],
            "undefined"
        );

        let markdown = render_markdown(
            &analysis,
            &summary,
            None,
            NaiveDate::from_ymd_opt(2024, 1, 14).expect("valid date"),
        );
        assert!(markdown.contains("# Running Analysis Report - 2024-01-14"));
        assert!(markdown.contains("| 2024-W01 | 2 | 1 | 0 | 1 | 5:30 | -0.250 |"));
        assert!(markdown.contains("- No recommendation generated"));
    }

    #[test]
    fn empty_dataset_is_rejected() {
        assert!(matches!(analyze(&[]), Err(PipelineError::EmptyDataset(_))));
    }

    #[test]
    fn two_weeks_cannot_train_a_forecast() {
        let analysis = analyze(&two_week_dataset()).expect("analysis");

        assert!(matches!(
            forecast(&analysis, 0.2),
            Err(PipelineError::InsufficientData { got: 1, .. })
        ));
    }
}
