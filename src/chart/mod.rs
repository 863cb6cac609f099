use crate::analyzer::report::format_optional;
use crate::analyzer::stats::simple_linear_fit;
use crate::analyzer::weekly::{LaggedCorrelations, WeeklyAggregate, lagged_pairs};
use anyhow::{Context, Result};
use plotters::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

const PACE_TREND_FILE: &str = "pace_trend.svg";
const SPEED_CORRELATION_FILE: &str = "speed_correlation.svg";
const FONT: &str = "sans-serif";

#[derive(Debug)]
pub struct ChartPaths {
    pub pace_trend: PathBuf,
    pub speed_correlation: PathBuf,
}

pub fn render_charts(
    weeks: &[WeeklyAggregate],
    correlations: &LaggedCorrelations,
    output_dir: &Path,
) -> Result<ChartPaths> {
    fs::create_dir_all(output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            output_dir.display()
        )
    })?;

    let pace_trend = output_dir.join(PACE_TREND_FILE);
    render_pace_trend(weeks, &pace_trend)?;

    let speed_correlation = output_dir.join(SPEED_CORRELATION_FILE);
    render_speed_correlation(weeks, correlations, &speed_correlation)?;

    Ok(ChartPaths {
        pace_trend,
        speed_correlation,
    })
}

/// Weekly average pace over time. Pace is plotted negated so that faster
/// weeks sit higher; axis labels show the real value.
pub fn render_pace_trend(weeks: &[WeeklyAggregate], path: &Path) -> Result<()> {
    let points = weeks
        .iter()
        .enumerate()
        .map(|(index, week)| (index as f64, -week.avg_pace))
        .collect::<Vec<_>>();
    let labels = weeks
        .iter()
        .map(|week| format!("{}-W{:02}", week.year, week.week))
        .collect::<Vec<_>>();

    let x_max = (points.len().saturating_sub(1) as f64).max(1.0);
    let (y_min, y_max) = padded_range(points.iter().map(|(_, y)| *y));

    let root = SVGBackend::new(path, (1000, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Weekly Average Pace (higher is faster)", (FONT, 22))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.25f64..x_max + 0.25, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Training week")
        .y_desc("Average pace (min/km)")
        .x_labels(labels.len().clamp(2, 12))
        .x_label_formatter(&|x| {
            let index = x.round();
            if index >= 0.0 && (x - index).abs() < 1e-6 {
                labels.get(index as usize).cloned().unwrap_or_default()
            } else {
                String::new()
            }
        })
        .y_label_formatter(&|y| format!("{:.2}", -y))
        .draw()?;

    chart.draw_series(LineSeries::new(points.clone(), &BLUE))?;
    chart.draw_series(
        points
            .iter()
            .map(|point| Circle::new(*point, 4, BLUE.filled())),
    )?;

    root.present()
        .with_context(|| format!("Failed to write chart: {}", path.display()))?;

    Ok(())
}

/// Each week's speed-run count against the pace change into the following
/// week, with a least-squares line and the zero-change reference.
pub fn render_speed_correlation(
    weeks: &[WeeklyAggregate],
    correlations: &LaggedCorrelations,
    path: &Path,
) -> Result<()> {
    let pairs = lagged_pairs(weeks, |week| week.speed_runs);

    let x_max = pairs
        .iter()
        .map(|(count, _)| *count)
        .fold(1.0f64, f64::max)
        + 0.5;
    let (y_min, y_max) = padded_range(pairs.iter().map(|(_, delta)| *delta).chain([0.0]));

    let root = SVGBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let caption = format!(
        "Speed runs vs pace change (r = {})",
        format_optional(correlations.speed_runs_vs_pace_delta, 3)
    );
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, (FONT, 22))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Speed/interval runs in week i")
        .y_desc("Pace change week i to i+1 (min/km, negative is faster)")
        .y_label_formatter(&|y| format!("{y:.2}"))
        .draw()?;

    chart.draw_series(LineSeries::new(
        [(-0.5, 0.0), (x_max, 0.0)],
        &BLACK.mix(0.4),
    ))?;

    let text_x = x_max * 0.5;
    let offset = (y_max - y_min) * 0.03;
    chart.draw_series([
        Text::new(
            "Slowing zone".to_string(),
            (text_x, offset),
            (FONT, 14).into_font().color(&BLACK),
        ),
        Text::new(
            "Improving zone (faster)".to_string(),
            (text_x, -offset * 2.0),
            (FONT, 14).into_font().color(&GREEN),
        ),
    ])?;

    chart.draw_series(
        pairs
            .iter()
            .map(|point| Circle::new(*point, 5, RED.mix(0.7).filled())),
    )?;

    if let Some((slope, intercept)) = simple_linear_fit(&pairs) {
        let x_start = 0.0;
        let x_end = x_max - 0.5;
        chart.draw_series(LineSeries::new(
            [
                (x_start, intercept + slope * x_start),
                (x_end, intercept + slope * x_end),
            ],
            &RED,
        ))?;
    }

    root.present()
        .with_context(|| format!("Failed to write chart: {}", path.display()))?;

    Ok(())
}

/// Min/max of `values` widened by 10% (at least 0.1). Empty input maps to 0..1.
fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values
        .filter(|value| value.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), value| {
            (min.min(value), max.max(value))
        });

    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }

    let pad = ((max - min) * 0.1).max(0.1);
    (min - pad, max + pad)
}

#[cfg(test)]
mod tests {
    use super::{padded_range, render_charts};
    use crate::analyzer::weekly::{WeeklyAggregate, lagged_correlations};
    use std::fs;
    use tempfile::tempdir;

    fn week(
        week: u32,
        avg_pace: f64,
        speed_runs: usize,
        pace_delta: Option<f64>,
    ) -> WeeklyAggregate {
        WeeklyAggregate {
            year: 2024,
            week,
            avg_pace,
            speed_runs,
            tempo_runs: 1,
            easy_runs: 1,
            total_runs: speed_runs + 2,
            pace_delta,
        }
    }

    #[test]
    fn range_is_padded_and_never_empty() {
        assert_eq!(padded_range(std::iter::empty()), (0.0, 1.0));

        let (min, max) = padded_range([5.0, 5.0].into_iter());
        assert!(min < 5.0 && max > 5.0);

        let (min, max) = padded_range([-1.0, 1.0, f64::NAN].into_iter());
        assert!((min - (-1.2)).abs() < 1e-9);
        assert!((max - 1.2).abs() < 1e-9);
    }

    #[test]
    fn writes_both_svg_charts() {
        let temp = tempdir().expect("tempdir");
        let weeks = vec![
            week(1, 6.2, 0, Some(-0.2)),
            week(2, 6.0, 1, Some(-0.3)),
            week(3, 5.7, 2, Some(0.1)),
            week(4, 5.8, 1, None),
        ];
        let correlations = lagged_correlations(&weeks);

        let paths = render_charts(&weeks, &correlations, temp.path()).expect("render charts");

        let trend = fs::read_to_string(&paths.pace_trend).expect("trend svg");
        let scatter = fs::read_to_string(&paths.speed_correlation).expect("scatter svg");
        assert!(trend.contains("<svg"));
        assert!(trend.contains("Weekly Average Pace"));
        assert!(scatter.contains("<svg"));
        assert!(scatter.contains("Speed runs vs pace change (r = "));
    }

    #[test]
    fn single_week_still_renders() {
        let temp = tempdir().expect("tempdir");
        let weeks = vec![week(1, 6.0, 1, None)];
        let correlations = lagged_correlations(&weeks);

        let paths = render_charts(&weeks, &correlations, temp.path()).expect("render charts");

        let scatter = fs::read_to_string(&paths.speed_correlation).expect("scatter svg");
        assert!(scatter.contains("r = undefined"));
    }
}
