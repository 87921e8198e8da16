//! Pearson's chi-square goodness-of-fit test.

use anyhow::{Result, anyhow, bail};
use log::warn;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use std::fmt;

/// Relative difference between observed and expected totals that we still accept silently.
const TOTAL_TOLERANCE: f64 = 1e-3;

/// A single bin of the test. Pooled bins are represented by their boundary value.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyRow {
    pub k: u64,
    pub observed: f64,
    pub expected: f64,
}

/// The outcome of a goodness-of-fit test, including the table it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct GoodnessOfFit {
    pub statistic: f64,
    pub p_value: f64,
    pub dof: u64,
    pub table: Vec<FrequencyRow>,
}

impl fmt::Display for GoodnessOfFit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "statistic={}, pvalue={}, dof={}",
            self.statistic, self.p_value, self.dof
        )
    }
}

/// Render the frequency table, one bin per line.
pub fn format_table(table: &[FrequencyRow]) -> String {
    let mut out = format!("{:>8} {:>14} {:>14}\n", "k", "observed", "expected");
    for row in table {
        out.push_str(&format!(
            "{:>8} {:>14} {:>14.6}\n",
            row.k, row.observed, row.expected
        ));
    }
    out
}

/// Run the test over a prepared frequency table.
///
/// # Errors
/// Returns an error if there are fewer than two bins or any expected count is not positive.
pub fn chi_square(table: Vec<FrequencyRow>) -> Result<GoodnessOfFit> {
    if table.len() < 2 {
        bail!(
            "A chi-square test needs at least two bins, got {}",
            table.len()
        );
    }
    if let Some(row) = table
        .iter()
        .find(|r| !(r.expected.is_finite() && r.expected > 0.0))
    {
        bail!(
            "Expected frequency for k={} must be positive and finite, got {}",
            row.k,
            row.expected
        );
    }

    let observed_total: f64 = table.iter().map(|r| r.observed).sum();
    let expected_total: f64 = table.iter().map(|r| r.expected).sum();
    if ((observed_total - expected_total) / expected_total).abs() > TOTAL_TOLERANCE {
        warn!(
            "Observed total {observed_total} differs from expected total {expected_total:.3}, the test may be unreliable"
        );
    }

    let statistic: f64 = table
        .iter()
        .map(|r| (r.observed - r.expected).powi(2) / r.expected)
        .sum();
    let dof = table.len() as u64 - 1;

    #[allow(clippy::cast_precision_loss)]
    let distribution = ChiSquared::new(dof as f64)
        .map_err(|e| anyhow!("Could not build chi-square distribution with {dof} dof: {e}"))?;
    let p_value = distribution.sf(statistic);

    Ok(GoodnessOfFit {
        statistic,
        p_value,
        dof,
        table,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(k: u64, observed: f64, expected: f64) -> FrequencyRow {
        FrequencyRow {
            k,
            observed,
            expected,
        }
    }

    #[test]
    fn test_perfect_fit() {
        let table = vec![row(0, 10.0, 10.0), row(1, 20.0, 20.0), row(2, 30.0, 30.0)];
        let fit = chi_square(table).unwrap();
        assert_eq!(fit.statistic, 0.0);
        assert_eq!(fit.dof, 2);
        assert!((fit.p_value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_known_statistic() {
        // (16-22)^2/22 + (18-22)^2/22 + (16-22)^2/22 + (14-22)^2/22 + (12-22)^2/22 + (12-22)^2/22
        let table = vec![
            row(1, 16.0, 22.0),
            row(2, 18.0, 22.0),
            row(3, 16.0, 22.0),
            row(4, 14.0, 22.0),
            row(5, 12.0, 22.0),
            row(6, 12.0, 22.0),
        ];
        let fit = chi_square(table).unwrap();
        assert!((fit.statistic - 352.0 / 22.0).abs() < 1e-9);
        assert_eq!(fit.dof, 5);
        // upper tail of chi2(5) at 16
        assert!((fit.p_value - 0.006_84).abs() < 1e-4);
    }

    #[test_log::test]
    fn test_mismatched_totals_still_computes() {
        let table = vec![row(0, 5.0, 10.0), row(1, 5.0, 10.0)];
        let fit = chi_square(table).unwrap();
        assert!((fit.statistic - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_bin_is_rejected() {
        assert!(chi_square(vec![row(0, 1.0, 1.0)]).is_err());
        assert!(chi_square(Vec::new()).is_err());
    }

    #[test]
    fn test_zero_expected_is_rejected() {
        let table = vec![row(0, 1.0, 0.0), row(1, 1.0, 2.0)];
        assert!(chi_square(table).is_err());
    }

    #[test]
    fn test_display() {
        let fit = chi_square(vec![row(0, 1.0, 1.0), row(1, 1.0, 1.0)]).unwrap();
        let shown = fit.to_string();
        assert!(shown.starts_with("statistic=0, pvalue="));
        assert!(shown.ends_with(", dof=1"));
    }
}
