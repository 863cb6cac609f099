use crate::analyzer::weekly::WeeklyAggregate;
use crate::error::PipelineError;
use serde::Serialize;

pub const MIN_TRAINING_ROWS: usize = 3;
const SINGULAR_TOLERANCE: f64 = 1e-10;

/// One supervised example: this week's pace and volume against next week's pace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrainingSample {
    pub pace: f64,
    pub volume: f64,
    pub next_pace: f64,
}

/// `next_pace = intercept + pace_coefficient * pace + volume_coefficient * volume`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastModel {
    pub intercept: f64,
    pub pace_coefficient: f64,
    pub volume_coefficient: f64,
    pub training_rows: usize,
    pub holdout_rows: usize,
    pub holdout_mae: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaceTrend {
    Improving,
    Slowing,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Forecast {
    pub year: i32,
    pub week: u32,
    pub current_pace: f64,
    pub current_runs: usize,
    pub predicted_pace: f64,
    pub trend: PaceTrend,
}

impl ForecastModel {
    pub fn predict(&self, pace: f64, volume: f64) -> f64 {
        self.intercept + self.pace_coefficient * pace + self.volume_coefficient * volume
    }
}

/// Rows with a defined next-week target, in chronological order.
pub fn training_samples(weeks: &[WeeklyAggregate]) -> Vec<TrainingSample> {
    weeks
        .windows(2)
        .filter(|pair| pair[0].pace_delta.is_some())
        .map(|pair| TrainingSample {
            pace: pair[0].avg_pace,
            volume: pair[0].total_runs as f64,
            next_pace: pair[1].avg_pace,
        })
        .collect()
}

/// Fits OLS on the chronological prefix and scores the held-out suffix.
///
/// The suffix holds `ceil(samples * holdout_fraction)` rows; no shuffling.
pub fn fit_forecast_model(
    weeks: &[WeeklyAggregate],
    holdout_fraction: f64,
) -> Result<ForecastModel, PipelineError> {
    let samples = training_samples(weeks);
    if samples.len() < MIN_TRAINING_ROWS {
        return Err(PipelineError::InsufficientData {
            stage: "pace forecast (weeks with a following week)",
            needed: MIN_TRAINING_ROWS,
            got: samples.len(),
        });
    }

    let fraction = if holdout_fraction.is_finite() {
        holdout_fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let holdout_rows = ((samples.len() as f64) * fraction).ceil() as usize;
    let training_rows = samples.len().saturating_sub(holdout_rows);
    if training_rows < MIN_TRAINING_ROWS {
        return Err(PipelineError::InsufficientData {
            stage: "pace forecast training split",
            needed: MIN_TRAINING_ROWS,
            got: training_rows,
        });
    }

    let (train, holdout) = samples.split_at(training_rows);
    let (intercept, pace_coefficient, volume_coefficient) = ordinary_least_squares(train);

    let mut model = ForecastModel {
        intercept,
        pace_coefficient,
        volume_coefficient,
        training_rows,
        holdout_rows: holdout.len(),
        holdout_mae: None,
    };
    model.holdout_mae = (!holdout.is_empty()).then(|| {
        holdout
            .iter()
            .map(|sample| (model.predict(sample.pace, sample.volume) - sample.next_pace).abs())
            .sum::<f64>()
            / holdout.len() as f64
    });

    Ok(model)
}

/// Applies the model to the most recent week.
pub fn forecast_next_week(model: &ForecastModel, weeks: &[WeeklyAggregate]) -> Option<Forecast> {
    weeks.last().map(|latest| {
        let predicted_pace = model.predict(latest.avg_pace, latest.total_runs as f64);

        Forecast {
            year: latest.year,
            week: latest.week,
            current_pace: latest.avg_pace,
            current_runs: latest.total_runs,
            predicted_pace,
            trend: if predicted_pace < latest.avg_pace {
                PaceTrend::Improving
            } else {
                PaceTrend::Slowing
            },
        }
    })
}

/// Two-feature least squares with intercept, solved on centered data.
/// Collinear or constant features fall back to the minimum-norm solution.
fn ordinary_least_squares(samples: &[TrainingSample]) -> (f64, f64, f64) {
    let n = samples.len() as f64;
    let mean_pace = samples.iter().map(|s| s.pace).sum::<f64>() / n;
    let mean_volume = samples.iter().map(|s| s.volume).sum::<f64>() / n;
    let mean_target = samples.iter().map(|s| s.next_pace).sum::<f64>() / n;

    let (s11, s12, s22, s1y, s2y) = samples.iter().fold(
        (0.0, 0.0, 0.0, 0.0, 0.0),
        |(s11, s12, s22, s1y, s2y), sample| {
            let x1 = sample.pace - mean_pace;
            let x2 = sample.volume - mean_volume;
            let y = sample.next_pace - mean_target;
            (
                s11 + x1 * x1,
                s12 + x1 * x2,
                s22 + x2 * x2,
                s1y + x1 * y,
                s2y + x2 * y,
            )
        },
    );

    let determinant = s11 * s22 - s12 * s12;
    let (b1, b2) = if determinant > SINGULAR_TOLERANCE * s11 * s22 && determinant > 0.0 {
        (
            (s22 * s1y - s12 * s2y) / determinant,
            (s11 * s2y - s12 * s1y) / determinant,
        )
    } else {
        // Rank <= 1: pinv(A) = A / trace(A)^2.
        let trace = s11 + s22;
        if trace <= f64::EPSILON {
            (0.0, 0.0)
        } else {
            let scale = trace * trace;
            ((s11 * s1y + s12 * s2y) / scale, (s12 * s1y + s22 * s2y) / scale)
        }
    };

    (mean_target - b1 * mean_pace - b2 * mean_volume, b1, b2)
}
