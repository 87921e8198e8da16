//! Descriptive statistics for the textual reports.

use statrs::statistics::Statistics;
use std::fmt;

/// Percentiles reported when nothing else is requested.
pub const DEFAULT_PERCENTILES: [f64; 3] = [0.25, 0.5, 0.75];

/// Count, moments, extremes and percentiles of a sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub count: u64,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// Pairs of (percentile in `0..=1`, value).
    pub percentiles: Vec<(f64, f64)>,
}

impl Summary {
    /// Summarize a plain list of values.
    /// Returns `None` for an empty list.
    pub fn from_values(values: &[f64], percentiles: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let weighted: Vec<(f64, u64)> = sorted.iter().map(|v| (*v, 1)).collect();

        Some(Summary {
            count: values.len() as u64,
            mean: Statistics::mean(values),
            std: Statistics::std_dev(values),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            percentiles: percentiles
                .iter()
                .map(|q| (*q, quantile(&weighted, *q)))
                .collect(),
        })
    }

    /// Summarize values that each occurred `weight` times, as if the sample had been expanded.
    /// Fractional weights are truncated. Returns `None` if the total weight is zero.
    pub fn from_weighted(values: &[(f64, f64)], percentiles: &[f64]) -> Option<Self> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let mut weighted: Vec<(f64, u64)> = values
            .iter()
            .map(|(v, w)| (*v, w.max(0.0) as u64))
            .filter(|(_, w)| *w > 0)
            .collect();
        if weighted.is_empty() {
            return None;
        }
        weighted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let count: u64 = weighted.iter().map(|(_, w)| w).sum();
        #[allow(clippy::cast_precision_loss)]
        let n = count as f64;
        #[allow(clippy::cast_precision_loss)]
        let mean = weighted.iter().map(|(v, w)| v * *w as f64).sum::<f64>() / n;
        #[allow(clippy::cast_precision_loss)]
        let sum_squares: f64 = weighted
            .iter()
            .map(|(v, w)| (v - mean).powi(2) * *w as f64)
            .sum();
        let std = if count > 1 {
            (sum_squares / (n - 1.0)).sqrt()
        } else {
            f64::NAN
        };

        Some(Summary {
            count,
            mean,
            std,
            min: weighted[0].0,
            max: weighted[weighted.len() - 1].0,
            percentiles: percentiles
                .iter()
                .map(|q| (*q, quantile(&weighted, *q)))
                .collect(),
        })
    }
}

/// The value at a zero-based rank of the expanded sample.
fn value_at_rank(sorted: &[(f64, u64)], rank: u64) -> f64 {
    let mut seen = 0;
    for (value, weight) in sorted {
        seen += weight;
        if rank < seen {
            return *value;
        }
    }
    sorted.last().map_or(f64::NAN, |(v, _)| *v)
}

/// Linear interpolation between the closest ranks of a sorted, weighted sample.
fn quantile(sorted: &[(f64, u64)], q: f64) -> f64 {
    let count: u64 = sorted.iter().map(|(_, w)| w).sum();
    if count == 0 {
        return f64::NAN;
    }
    #[allow(clippy::cast_precision_loss)]
    let position = (count - 1) as f64 * q.clamp(0.0, 1.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let lower = position.floor() as u64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let upper = position.ceil() as u64;
    let low_value = value_at_rank(sorted, lower);
    let high_value = value_at_rank(sorted, upper);
    #[allow(clippy::cast_precision_loss)]
    let fraction = position - lower as f64;
    low_value + (high_value - low_value) * fraction
}

fn percentile_label(q: f64) -> String {
    format!("{}%", (q * 1000.0).round() / 10.0)
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{:<8}{:>18.6}", "count", self.count)?;
        writeln!(f, "{:<8}{:>18.6}", "mean", self.mean)?;
        writeln!(f, "{:<8}{:>18.6}", "std", self.std)?;
        writeln!(f, "{:<8}{:>18.6}", "min", self.min)?;
        for (q, value) in &self.percentiles {
            writeln!(f, "{:<8}{:>18.6}", percentile_label(*q), value)?;
        }
        write!(f, "{:<8}{:>18.6}", "max", self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_from_values() {
        let summary = Summary::from_values(&[4.0, 1.0, 3.0, 2.0], &DEFAULT_PERCENTILES).unwrap();
        assert_eq!(summary.count, 4);
        assert!(close(summary.mean, 2.5));
        // sample standard deviation of 1..=4
        assert!(close(summary.std, (5.0f64 / 3.0).sqrt()));
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 4.0);
        assert_eq!(
            summary.percentiles,
            vec![(0.25, 1.75), (0.5, 2.5), (0.75, 3.25)]
        );
    }

    #[test]
    fn test_empty() {
        assert_eq!(Summary::from_values(&[], &DEFAULT_PERCENTILES), None);
        assert_eq!(Summary::from_weighted(&[], &DEFAULT_PERCENTILES), None);
        assert_eq!(
            Summary::from_weighted(&[(1.0, 0.0), (2.0, 0.4)], &DEFAULT_PERCENTILES),
            None
        );
    }

    #[test]
    fn test_weighted_matches_expanded() {
        let weighted = [(10.0, 3.0), (5.0, 1.0), (20.0, 2.0)];
        let expanded = [5.0, 10.0, 10.0, 10.0, 20.0, 20.0];
        let percentiles = [0.1, 0.25, 0.5, 0.9, 0.999];

        let a = Summary::from_weighted(&weighted, &percentiles).unwrap();
        let b = Summary::from_values(&expanded, &percentiles).unwrap();
        assert_eq!(a.count, b.count);
        assert!(close(a.mean, b.mean));
        assert!(close(a.std, b.std));
        assert_eq!(a.min, b.min);
        assert_eq!(a.max, b.max);
        for ((qa, va), (qb, vb)) in a.percentiles.iter().zip(&b.percentiles) {
            assert_eq!(qa, qb);
            assert!(close(*va, *vb), "{qa}: {va} != {vb}");
        }
    }

    #[test]
    fn test_weighted_single_observation() {
        let summary = Summary::from_weighted(&[(7.0, 1.0)], &[0.5]).unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.mean, 7.0);
        assert!(summary.std.is_nan());
        assert_eq!(summary.percentiles, vec![(0.5, 7.0)]);
    }

    #[test]
    fn test_display() {
        let summary = Summary::from_values(&[1.0, 2.0], &[0.5, 0.999]).unwrap();
        let shown = summary.to_string();
        let labels: Vec<&str> = shown
            .lines()
            .map(|l| l.split_whitespace().next().unwrap())
            .collect();
        assert_eq!(
            labels,
            vec!["count", "mean", "std", "min", "50%", "99.9%", "max"]
        );
    }
}
