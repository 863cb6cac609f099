use crate::analyzer::classifier::{ClassifiedRecord, WorkoutType};
use crate::analyzer::stats::{mean, pearson};
use chrono::Datelike;
use serde::Serialize;
use std::collections::BTreeMap;

/// One ISO calendar week of running.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyAggregate {
    pub year: i32,
    pub week: u32,
    pub avg_pace: f64,
    pub speed_runs: usize,
    pub tempo_runs: usize,
    pub easy_runs: usize,
    pub total_runs: usize,
    /// Next week's average pace minus this week's; negative means faster.
    /// Missing on the most recent week.
    pub pace_delta: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LaggedCorrelations {
    pub speed_runs_vs_pace_delta: Option<f64>,
    pub easy_runs_vs_pace_delta: Option<f64>,
    pub speed_pairs: usize,
    pub easy_pairs: usize,
}

/// Groups by ISO (year, week) and returns rows in chronological order with
/// pace deltas filled in.
pub fn aggregate_weeks(classified: &[ClassifiedRecord]) -> Vec<WeeklyAggregate> {
    let groups = classified.iter().fold(
        BTreeMap::<(i32, u32), Vec<&ClassifiedRecord>>::new(),
        |mut acc, entry| {
            let iso = entry.record.date.iso_week();
            acc.entry((iso.year(), iso.week())).or_default().push(entry);
            acc
        },
    );

    let mut weeks = groups
        .into_iter()
        .map(|((year, week), entries)| {
            let paces = entries
                .iter()
                .map(|entry| entry.record.pace_decimal)
                .collect::<Vec<_>>();
            let count_of = |workout_type: WorkoutType| {
                entries
                    .iter()
                    .filter(|entry| entry.workout_type == workout_type)
                    .count()
            };

            WeeklyAggregate {
                year,
                week,
                avg_pace: mean(&paces).unwrap_or_default(),
                speed_runs: count_of(WorkoutType::SpeedInterval),
                tempo_runs: count_of(WorkoutType::TempoModerate),
                easy_runs: count_of(WorkoutType::EasyRecovery),
                total_runs: entries.len(),
                pace_delta: None,
            }
        })
        .collect::<Vec<_>>();

    let next_paces = weeks
        .iter()
        .skip(1)
        .map(|week| week.avg_pace)
        .collect::<Vec<_>>();
    weeks
        .iter_mut()
        .zip(next_paces)
        .for_each(|(week, next_pace)| week.pace_delta = Some(next_pace - week.avg_pace));

    weeks
}

/// Pairs week `i`'s count with the pace change that follows it (week `i` to
/// `i + 1`), dropping weeks whose delta is missing.
pub fn lagged_pairs(
    weeks: &[WeeklyAggregate],
    count: impl Fn(&WeeklyAggregate) -> usize,
) -> Vec<(f64, f64)> {
    weeks
        .iter()
        .filter_map(|week| {
            week.pace_delta
                .filter(|delta| delta.is_finite())
                .map(|delta| (count(week) as f64, delta))
        })
        .collect()
}

pub fn lagged_correlations(weeks: &[WeeklyAggregate]) -> LaggedCorrelations {
    let speed = lagged_pairs(weeks, |week| week.speed_runs);
    let easy = lagged_pairs(weeks, |week| week.easy_runs);

    LaggedCorrelations {
        speed_runs_vs_pace_delta: pearson(&speed),
        easy_runs_vs_pace_delta: pearson(&easy),
        speed_pairs: speed.len(),
        easy_pairs: easy.len(),
    }
}

/// Mean of the defined pace deltas.
pub fn mean_pace_delta(weeks: &[WeeklyAggregate]) -> Option<f64> {
    let deltas = weeks
        .iter()
        .filter_map(|week| week.pace_delta)
        .collect::<Vec<_>>();
    mean(&deltas)
}

#[cfg(test)]
mod tests {
    use super::{aggregate_weeks, lagged_correlations, lagged_pairs, mean_pace_delta};
    use crate::analyzer::classifier::{ClassifiedRecord, WorkoutType};
    use crate::analyzer::cleaner::CleanedRecord;
    use chrono::NaiveDate;

    fn entry(
        year: i32,
        month: u32,
        day: u32,
        pace: f64,
        workout_type: WorkoutType,
    ) -> ClassifiedRecord {
        let start = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(6, 0, 0))
            .expect("valid datetime");
        let record = CleanedRecord::derive(
            "Run".to_string(),
            start,
            1000.0,
            pace * 60.0,
            0.0,
            0.0,
            0.0,
            None,
        )
        .expect("valid record");

        ClassifiedRecord {
            record,
            workout_type,
        }
    }

    #[test]
    fn iso_weeks_stay_ordered_across_year_boundary() {
        let classified = vec![
            entry(2021, 1, 4, 5.0, WorkoutType::SpeedInterval),
            entry(2020, 12, 31, 6.0, WorkoutType::EasyRecovery),
            entry(2021, 1, 1, 5.5, WorkoutType::TempoModerate),
        ];

        let weeks = aggregate_weeks(&classified);

        assert_eq!(
            weeks
                .iter()
                .map(|week| (week.year, week.week))
                .collect::<Vec<_>>(),
            vec![(2020, 53), (2021, 1)]
        );
        assert_eq!(weeks[0].total_runs, 2);
        assert_eq!(weeks[0].easy_runs, 1);
        assert_eq!(weeks[0].tempo_runs, 1);
        assert!((weeks[0].avg_pace - 5.75).abs() < 1e-9);
        assert!((weeks[0].pace_delta.expect("delta") - (5.0 - 5.75)).abs() < 1e-9);
    }

    #[test]
    fn totals_are_preserved_and_last_delta_is_missing() {
        let classified = vec![
            entry(2024, 1, 1, 5.0, WorkoutType::SpeedInterval),
            entry(2024, 1, 3, 6.0, WorkoutType::EasyRecovery),
            entry(2024, 1, 9, 5.5, WorkoutType::TempoModerate),
            entry(2024, 1, 16, 5.0, WorkoutType::SpeedInterval),
            entry(2024, 1, 18, 5.0, WorkoutType::SpeedInterval),
        ];

        let weeks = aggregate_weeks(&classified);

        assert_eq!(weeks.len(), 3);
        assert_eq!(
            weeks.iter().map(|week| week.total_runs).sum::<usize>(),
            classified.len()
        );
        assert_eq!(weeks.last().and_then(|week| week.pace_delta), None);
        assert!(weeks[..2].iter().all(|week| week.pace_delta.is_some()));
    }

    #[test]
    fn lagged_pairs_use_current_week_counts() {
        let classified = vec![
            entry(2024, 1, 1, 6.0, WorkoutType::EasyRecovery),
            entry(2024, 1, 8, 5.0, WorkoutType::SpeedInterval),
            entry(2024, 1, 9, 5.0, WorkoutType::SpeedInterval),
            entry(2024, 1, 15, 5.5, WorkoutType::TempoModerate),
        ];
        let weeks = aggregate_weeks(&classified);

        let pairs = lagged_pairs(&weeks, |week| week.speed_runs);

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0, 0.0);
        assert!((pairs[0].1 - (-1.0)).abs() < 1e-9);
        assert_eq!(pairs[1].0, 2.0);
        assert!((pairs[1].1 - 0.5).abs() < 1e-9);
    }

    #[test]
    fn speed_block_is_paired_with_the_slowdown_after_it() {
        let classified = vec![
            entry(2024, 1, 1, 5.0, WorkoutType::SpeedInterval),
            entry(2024, 1, 2, 5.0, WorkoutType::SpeedInterval),
            entry(2024, 1, 3, 5.0, WorkoutType::SpeedInterval),
            entry(2024, 1, 8, 6.0, WorkoutType::EasyRecovery),
            entry(2024, 1, 15, 6.0, WorkoutType::EasyRecovery),
        ];
        let weeks = aggregate_weeks(&classified);

        let pairs = lagged_pairs(&weeks, |week| week.speed_runs);

        assert_eq!(weeks[0].speed_runs, 3);
        assert_eq!(pairs, vec![(3.0, 1.0), (0.0, 0.0)]);
    }

    #[test]
    fn correlation_is_undefined_with_fewer_than_two_pairs() {
        let classified = vec![
            entry(2024, 1, 1, 6.0, WorkoutType::EasyRecovery),
            entry(2024, 1, 8, 5.0, WorkoutType::SpeedInterval),
        ];
        let weeks = aggregate_weeks(&classified);

        let correlations = lagged_correlations(&weeks);

        assert_eq!(correlations.speed_pairs, 1);
        assert_eq!(correlations.speed_runs_vs_pace_delta, None);
        assert_eq!(correlations.easy_runs_vs_pace_delta, None);
        assert!(lagged_correlations(&[]).speed_runs_vs_pace_delta.is_none());
    }

    #[test]
    fn mean_delta_ignores_missing_last_week() {
        let classified = vec![
            entry(2024, 1, 1, 6.0, WorkoutType::EasyRecovery),
            entry(2024, 1, 8, 5.0, WorkoutType::SpeedInterval),
            entry(2024, 1, 15, 5.5, WorkoutType::TempoModerate),
        ];
        let weeks = aggregate_weeks(&classified);

        assert!((mean_pace_delta(&weeks).expect("mean") - (-0.25)).abs() < 1e-9);
        assert_eq!(mean_pace_delta(&weeks[2..]), None);
    }
}
