use crate::analyzer::cleaner::CleanedRecord;
use crate::analyzer::stats::quantile;
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WorkoutType {
    #[serde(rename = "SPEED/INTERVAL")]
    SpeedInterval,
    #[serde(rename = "TEMPO/MODERATE")]
    TempoModerate,
    #[serde(rename = "EASY/RECOVERY")]
    EasyRecovery,
}

impl WorkoutType {
    /// Stable enumeration order, also used to break ties.
    pub const ALL: [Self; 3] = [Self::SpeedInterval, Self::TempoModerate, Self::EasyRecovery];

    pub fn label(self) -> &'static str {
        match self {
            Self::SpeedInterval => "SPEED/INTERVAL",
            Self::TempoModerate => "TEMPO/MODERATE",
            Self::EasyRecovery => "EASY/RECOVERY",
        }
    }
}

impl fmt::Display for WorkoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Personal pace boundaries: Q1 and Q3 of pace over the whole dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PaceZones {
    pub q1: f64,
    pub q3: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRecord {
    pub record: CleanedRecord,
    pub workout_type: WorkoutType,
}

impl PaceZones {
    pub fn from_records(records: &[CleanedRecord]) -> Result<Self, PipelineError> {
        let paces = records
            .iter()
            .map(|record| record.pace_decimal)
            .collect::<Vec<_>>();

        match (quantile(&paces, 0.25), quantile(&paces, 0.75)) {
            (Some(q1), Some(q3)) => Ok(Self { q1, q3 }),
            _ => Err(PipelineError::InsufficientData {
                stage: "pace quartiles",
                needed: 1,
                got: 0,
            }),
        }
    }

    /// `pace <= Q1` is speed work, `pace >= Q3` is easy; only the open
    /// interval between them is tempo.
    pub fn classify(&self, pace: f64) -> WorkoutType {
        if pace <= self.q1 {
            WorkoutType::SpeedInterval
        } else if pace < self.q3 {
            WorkoutType::TempoModerate
        } else {
            WorkoutType::EasyRecovery
        }
    }
}

pub fn classify_records(records: &[CleanedRecord], zones: &PaceZones) -> Vec<ClassifiedRecord> {
    records
        .iter()
        .map(|record| ClassifiedRecord {
            workout_type: zones.classify(record.pace_decimal),
            record: record.clone(),
        })
        .collect()
}

/// Counts per workout type, in `WorkoutType::ALL` order.
pub fn workout_distribution(classified: &[ClassifiedRecord]) -> Vec<(WorkoutType, usize)> {
    WorkoutType::ALL
        .into_iter()
        .map(|workout_type| {
            let count = classified
                .iter()
                .filter(|entry| entry.workout_type == workout_type)
                .count();
            (workout_type, count)
        })
        .collect()
}

/// Most common label; ties go to the type listed first in `WorkoutType::ALL`.
pub fn most_frequent_workout(classified: &[ClassifiedRecord]) -> Option<WorkoutType> {
    workout_distribution(classified)
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .fold(None, |best: Option<(WorkoutType, usize)>, (workout_type, count)| {
            match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((workout_type, count)),
            }
        })
        .map(|(workout_type, _)| workout_type)
}
