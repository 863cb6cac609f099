use crate::collector::ActivityRecord;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;

const DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// A run with its derived human units. `distance_km > 0` and a finite pace
/// are guaranteed by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedRecord {
    pub name: String,
    pub start_date_local: NaiveDateTime,
    pub distance: f64,
    pub moving_time: f64,
    pub total_elevation_gain: f64,
    pub average_speed: f64,
    pub max_speed: f64,
    /// Absent when the activity was recorded without a heart-rate sensor.
    pub average_heartrate: Option<f64>,
    pub distance_km: f64,
    pub duration_min: f64,
    pub pace_decimal: f64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordIssue {
    #[error("not a running activity ({0})")]
    NotRun(String),
    #[error("unparseable start date: {0:?}")]
    UnparseableDate(String),
    #[error("distance is zero, pace undefined")]
    ZeroDistance,
    #[error("pace is not a finite number")]
    NonFinitePace,
}

#[derive(Debug, Clone, Default)]
pub struct CleaningOutcome {
    pub records: Vec<CleanedRecord>,
    pub skipped_non_run: usize,
    pub skipped_invalid: Vec<(String, RecordIssue)>,
}

impl CleanedRecord {
    /// Builds a record from base attributes, deriving km, minutes, pace and date.
    #[allow(clippy::too_many_arguments)]
    pub fn derive(
        name: String,
        start_date_local: NaiveDateTime,
        distance: f64,
        moving_time: f64,
        total_elevation_gain: f64,
        average_speed: f64,
        max_speed: f64,
        average_heartrate: Option<f64>,
    ) -> Result<Self, RecordIssue> {
        let distance_km = distance / 1000.0;
        let duration_min = moving_time / 60.0;

        if distance_km.is_nan() || distance_km <= 0.0 {
            return Err(RecordIssue::ZeroDistance);
        }

        let pace_decimal = duration_min / distance_km;
        if !pace_decimal.is_finite() {
            return Err(RecordIssue::NonFinitePace);
        }

        Ok(Self {
            name,
            start_date_local,
            distance,
            moving_time,
            total_elevation_gain,
            average_speed,
            max_speed,
            average_heartrate,
            distance_km,
            duration_min,
            pace_decimal,
            date: start_date_local.date(),
        })
    }
}

/// Keeps runs only and applies the default-value policy: numeric attributes
/// missing from the response become 0, heart rate stays absent.
pub fn clean_activity(activity: &ActivityRecord) -> Result<CleanedRecord, RecordIssue> {
    if !activity.is_run() {
        return Err(RecordIssue::NotRun(
            activity.kind().unwrap_or("unknown").to_string(),
        ));
    }

    let raw_start = activity.start_date_local.as_deref().unwrap_or_default();
    let start_date_local = parse_local_datetime(raw_start)
        .ok_or_else(|| RecordIssue::UnparseableDate(raw_start.to_string()))?;

    CleanedRecord::derive(
        activity.name.clone().unwrap_or_default(),
        start_date_local,
        activity.distance.unwrap_or(0.0),
        activity.moving_time.unwrap_or(0.0),
        activity.total_elevation_gain.unwrap_or(0.0),
        activity.average_speed.unwrap_or(0.0),
        activity.max_speed.unwrap_or(0.0),
        activity.average_heartrate,
    )
}

pub fn clean_activities(activities: &[ActivityRecord]) -> CleaningOutcome {
    activities
        .iter()
        .fold(CleaningOutcome::default(), |mut outcome, activity| {
            match clean_activity(activity) {
                Ok(record) => outcome.records.push(record),
                Err(RecordIssue::NotRun(_)) => outcome.skipped_non_run += 1,
                Err(issue) => outcome
                    .skipped_invalid
                    .push((activity.name.clone().unwrap_or_default(), issue)),
            }
            outcome
        })
}

/// Parses a local start timestamp. Strava marks local times with a `Z`
/// suffix even though they carry no offset, so the wall-clock part is kept.
pub fn parse_local_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|datetime| datetime.naive_local())
        .ok()
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::{RecordIssue, clean_activities, clean_activity, parse_local_datetime};
    use crate::collector::ActivityRecord;
    use chrono::NaiveDate;

    fn run(start: &str, distance: Option<f64>, moving_time: Option<f64>) -> ActivityRecord {
        ActivityRecord {
            name: Some("Run".to_string()),
            start_date_local: Some(start.to_string()),
            distance,
            moving_time,
            activity_type: Some("Run".to_string()),
            ..ActivityRecord::default()
        }
    }

    #[test]
    fn derived_fields_follow_unit_conversions() {
        let samples = [(5000.0, 1500.0), (10000.0, 3300.0), (4321.0, 1777.0)];

        for (distance, moving_time) in samples {
            let record = clean_activity(&run(
                "2024-01-08T07:00:00Z",
                Some(distance),
                Some(moving_time),
            ))
            .expect("clean record");

            assert!((record.distance_km - distance / 1000.0).abs() < 1e-12);
            assert!((record.duration_min - moving_time / 60.0).abs() < 1e-12);
            assert!((record.pace_decimal - record.duration_min / record.distance_km).abs() < 1e-12);
        }
    }

    #[test]
    fn missing_attributes_use_default_policy() {
        let record = clean_activity(&run("2024-01-08T07:15:00Z", Some(5000.0), None))
            .expect("clean record");

        assert_eq!(record.moving_time, 0.0);
        assert_eq!(record.total_elevation_gain, 0.0);
        assert_eq!(record.max_speed, 0.0);
        assert_eq!(record.average_heartrate, None);
        assert_eq!(record.pace_decimal, 0.0);
        assert_eq!(
            record.date,
            NaiveDate::from_ymd_opt(2024, 1, 8).expect("valid date")
        );
    }

    #[test]
    fn zero_distance_and_bad_dates_are_excluded() {
        let activities = vec![
            run("2024-01-08T07:00:00Z", Some(0.0), Some(600.0)),
            run("2024-01-08T07:00:00Z", None, Some(600.0)),
            run("yesterday", Some(5000.0), Some(1500.0)),
            run("2024-01-09T07:00:00Z", Some(5000.0), Some(1500.0)),
            ActivityRecord {
                activity_type: Some("Ride".to_string()),
                ..run("2024-01-09T07:00:00Z", Some(20000.0), Some(3600.0))
            },
        ];

        let outcome = clean_activities(&activities);

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.skipped_non_run, 1);
        assert_eq!(outcome.skipped_invalid.len(), 3);
        assert_eq!(outcome.skipped_invalid[0].1, RecordIssue::ZeroDistance);
        assert!(matches!(
            outcome.skipped_invalid[2].1,
            RecordIssue::UnparseableDate(_)
        ));
    }

    #[test]
    fn parses_common_timestamp_shapes() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 2)
            .and_then(|date| date.and_hms_opt(6, 30, 0))
            .expect("valid datetime");

        assert_eq!(parse_local_datetime("2024-03-02T06:30:00Z"), Some(expected));
        assert_eq!(parse_local_datetime("2024-03-02T06:30:00"), Some(expected));
        assert_eq!(parse_local_datetime("2024-03-02 06:30:00"), Some(expected));
        assert!(parse_local_datetime("2024-03-02").is_some());
        assert_eq!(parse_local_datetime(""), None);
        assert_eq!(parse_local_datetime("02/03/2024"), None);
    }
}
