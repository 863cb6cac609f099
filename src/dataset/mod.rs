use crate::analyzer::cleaner::{CleanedRecord, parse_local_datetime};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

const START_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// One CSV row. Field order is the column order on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DatasetRow {
    name: String,
    start_date_local: String,
    distance: f64,
    moving_time: f64,
    total_elevation_gain: f64,
    average_speed: f64,
    max_speed: f64,
    average_heartrate: Option<f64>,
    distance_km: f64,
    duration_min: f64,
    pace_decimal: f64,
    date: String,
}

#[derive(Debug, Default)]
pub struct DatasetLoad {
    pub records: Vec<CleanedRecord>,
    pub skipped_rows: usize,
}

impl From<&CleanedRecord> for DatasetRow {
    fn from(record: &CleanedRecord) -> Self {
        Self {
            name: record.name.clone(),
            start_date_local: record.start_date_local.format(START_FORMAT).to_string(),
            distance: record.distance,
            moving_time: record.moving_time,
            total_elevation_gain: record.total_elevation_gain,
            average_speed: record.average_speed,
            max_speed: record.max_speed,
            average_heartrate: record.average_heartrate,
            distance_km: record.distance_km,
            duration_min: record.duration_min,
            pace_decimal: record.pace_decimal,
            date: record.date.format(DATE_FORMAT).to_string(),
        }
    }
}

impl DatasetRow {
    fn into_record(self) -> Result<CleanedRecord> {
        let start_date_local = parse_local_datetime(&self.start_date_local)
            .with_context(|| format!("unparseable start date: {:?}", self.start_date_local))?;

        let record = CleanedRecord::derive(
            self.name,
            start_date_local,
            self.distance,
            self.moving_time,
            self.total_elevation_gain,
            self.average_speed,
            self.max_speed,
            self.average_heartrate,
        )?;

        Ok(record)
    }
}

/// Replaces the dataset file with `records`, creating parent directories.
pub fn write_dataset(path: &Path, records: &[CleanedRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create dataset directory: {}", parent.display()))?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to open dataset for writing: {}", path.display()))?;

    for record in records {
        writer
            .serialize(DatasetRow::from(record))
            .with_context(|| format!("Failed to write dataset row: {}", record.name))?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to flush dataset: {}", path.display()))?;

    Ok(())
}

/// Loads the dataset. Rows that fail to parse, or whose base attributes no
/// longer yield a valid pace, are skipped with a warning.
pub fn read_dataset(path: &Path) -> Result<DatasetLoad> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| {
            format!(
                "Failed to open dataset: {} (run `pacelab fetch` first)",
                path.display()
            )
        })?;

    let load = reader.deserialize::<DatasetRow>().enumerate().fold(
        DatasetLoad::default(),
        |mut load, (index, row)| {
            let line = index + 2;
            match row
                .context("malformed row")
                .and_then(DatasetRow::into_record)
            {
                Ok(record) => load.records.push(record),
                Err(error) => {
                    warn!("Skipping dataset line {line}: {error:#}");
                    load.skipped_rows += 1;
                }
            }
            load
        },
    );

    Ok(load)
}
