//! Small numeric helpers shared by the classifier, the weekly correlations
//! and the charts.

/// Quantile by linear interpolation between order statistics (`h = (n - 1) * p`).
///
/// Returns `None` for an empty sample or a probability outside `[0, 1]`.
/// Non-finite values are ignored.
pub fn quantile(values: &[f64], probability: f64) -> Option<f64> {
    if !(0.0..=1.0).contains(&probability) {
        return None;
    }

    let mut sorted = values
        .iter()
        .copied()
        .filter(|value| value.is_finite())
        .collect::<Vec<_>>();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let position = (sorted.len() - 1) as f64 * probability;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Pearson correlation of paired samples.
///
/// `None` when fewer than two pairs are available or either side has no
/// variance; the coefficient is undefined in both cases.
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (covariance, variance_x, variance_y) =
        pairs
            .iter()
            .fold((0.0, 0.0, 0.0), |(cov, var_x, var_y), (x, y)| {
                let dx = x - mean_x;
                let dy = y - mean_y;
                (cov + dx * dy, var_x + dx * dx, var_y + dy * dy)
            });

    let denominator = (variance_x * variance_y).sqrt();
    if denominator <= f64::EPSILON {
        return None;
    }

    Some((covariance / denominator).clamp(-1.0, 1.0))
}

/// Least-squares line `y = slope * x + intercept` through the pairs.
pub fn simple_linear_fit(pairs: &[(f64, f64)]) -> Option<(f64, f64)> {
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;
    let sxx = pairs.iter().map(|(x, _)| (x - mean_x).powi(2)).sum::<f64>();
    if sxx <= f64::EPSILON {
        return None;
    }
    let sxy = pairs
        .iter()
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum::<f64>();

    let slope = sxy / sxx;
    Some((slope, mean_y - slope * mean_x))
}
