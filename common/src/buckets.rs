//! Rebuild per-bucket frequencies from cumulative Prometheus histogram buckets.

use crate::plot::bin_weights;
use log::warn;

/// Upper bound substituted for the `+Inf` bucket: one day in milliseconds.
pub const INF_BUCKET_BOUND: f64 = 86_400_000.0;

/// Offset applied to every bin edge so bucket bounds fall inside, not on, an edge.
const EDGE_OFFSET: f64 = 0.0001;

/// A raw sample: the cumulative count of observations less than or equal to `le`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketSample {
    pub le: f64,
    pub count: f64,
}

/// The number of observations that fell into the bucket ending at `le`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub le: f64,
    pub count: f64,
}

/// Convert cumulative bucket samples into per-bucket frequencies.
///
/// Samples sharing a bound are summed, then each bucket's count becomes the difference to
/// its predecessor. Empty buckets past the last observation are dropped.
pub fn clean_data(samples: &[BucketSample]) -> Vec<Bucket> {
    let mut sorted: Vec<BucketSample> = samples
        .iter()
        .map(|s| BucketSample {
            le: if s.le == f64::INFINITY {
                INF_BUCKET_BOUND
            } else {
                s.le
            },
            count: s.count,
        })
        .collect();
    sorted.sort_by(|a, b| a.le.total_cmp(&b.le));

    // group by bound
    let mut cumulative: Vec<Bucket> = Vec::with_capacity(sorted.len());
    for sample in sorted {
        match cumulative.last_mut() {
            Some(last) if last.le == sample.le => last.count += sample.count,
            _ => cumulative.push(Bucket {
                le: sample.le,
                count: sample.count,
            }),
        }
    }

    // cumulative to incremental
    let mut buckets = cumulative.clone();
    for (i, window) in cumulative.windows(2).enumerate() {
        let diff = window[1].count - window[0].count;
        buckets[i + 1].count = if diff < 0.0 {
            warn!(
                "Cumulative count decreases from {} to {} at le={}, clamping to 0",
                window[0].count, window[1].count, window[1].le
            );
            0.0
        } else {
            diff
        };
    }

    if let Some(last_nonzero) = buckets.iter().rposition(|b| b.count != 0.0) {
        buckets.truncate(last_nonzero + 1);
    }
    buckets
}

/// Compute equal-width bin edges for plotting the buckets.
///
/// Bucket bounds grow non-linearly, but the chart should use equally sized bins. The width
/// is taken from the gap between the two largest bounds.
pub fn bins(buckets: &[Bucket]) -> Vec<f64> {
    match buckets {
        [] => Vec::new(),
        [only] => vec![0.0, only.le],
        [.., second_last, last] => {
            #[allow(clippy::cast_possible_truncation)]
            let width = ((last.le - second_last.le) as i64).max(1);
            #[allow(clippy::cast_possible_truncation)]
            let top = last.le.ceil() as i64;

            let mut edges = Vec::new();
            let mut edge = top;
            while edge >= 0 {
                #[allow(clippy::cast_precision_loss)]
                edges.push(edge as f64 + EDGE_OFFSET);
                edge -= width;
            }
            edges.reverse();
            edges
        }
    }
}

/// Sum the bucket counts into the given bins.
///
/// Bins are half-open except the last, which includes its upper edge. Buckets outside the
/// edges are not counted.
pub fn weighted_histogram(buckets: &[Bucket], edges: &[f64]) -> Vec<f64> {
    let points: Vec<(f64, f64)> = buckets.iter().map(|b| (b.le, b.count)).collect();
    bin_weights(&points, edges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(le: f64, count: f64) -> BucketSample {
        BucketSample { le, count }
    }

    fn bucket(le: f64, count: f64) -> Bucket {
        Bucket { le, count }
    }

    #[test]
    fn test_clean_data_cumulative_to_incremental() {
        let samples = vec![
            sample(5.0, 2.0),
            sample(10.0, 5.0),
            sample(25.0, 9.0),
            sample(f64::INFINITY, 10.0),
        ];
        assert_eq!(
            clean_data(&samples),
            vec![
                bucket(5.0, 2.0),
                bucket(10.0, 3.0),
                bucket(25.0, 4.0),
                bucket(INF_BUCKET_BOUND, 1.0),
            ]
        );
    }

    #[test]
    fn test_clean_data_sorts_and_groups() {
        // two series with the same bounds, returned out of order
        let samples = vec![
            sample(10.0, 4.0),
            sample(5.0, 1.0),
            sample(f64::INFINITY, 4.0),
            sample(5.0, 2.0),
            sample(10.0, 3.0),
            sample(f64::INFINITY, 3.0),
        ];
        assert_eq!(
            clean_data(&samples),
            vec![bucket(5.0, 3.0), bucket(10.0, 4.0)]
        );
    }

    #[test]
    fn test_clean_data_drops_trailing_empty_buckets() {
        let samples = vec![
            sample(1.0, 0.0),
            sample(2.0, 4.0),
            sample(4.0, 4.0),
            sample(8.0, 4.0),
            sample(f64::INFINITY, 4.0),
        ];
        assert_eq!(
            clean_data(&samples),
            vec![bucket(1.0, 0.0), bucket(2.0, 4.0)]
        );
    }

    #[test]
    fn test_clean_data_all_zero_keeps_buckets() {
        let samples = vec![sample(1.0, 0.0), sample(f64::INFINITY, 0.0)];
        assert_eq!(
            clean_data(&samples),
            vec![bucket(1.0, 0.0), bucket(INF_BUCKET_BOUND, 0.0)]
        );
    }

    #[test]
    fn test_clean_data_keeps_negative_infinity() {
        let samples = vec![
            sample(f64::NEG_INFINITY, 0.0),
            sample(5.0, 2.0),
            sample(f64::INFINITY, 3.0),
        ];
        assert_eq!(
            clean_data(&samples),
            vec![
                bucket(f64::NEG_INFINITY, 0.0),
                bucket(5.0, 2.0),
                bucket(INF_BUCKET_BOUND, 1.0),
            ]
        );
    }

    #[test]
    fn test_clean_data_empty() {
        assert!(clean_data(&[]).is_empty());
    }

    #[test_log::test]
    fn test_clean_data_clamps_counter_reset() {
        let samples = vec![sample(1.0, 5.0), sample(2.0, 3.0), sample(3.0, 6.0)];
        assert_eq!(
            clean_data(&samples),
            vec![bucket(1.0, 5.0), bucket(2.0, 0.0), bucket(3.0, 3.0)]
        );
    }

    #[test]
    fn test_bins_empty_and_single() {
        assert!(bins(&[]).is_empty());
        assert_eq!(bins(&[bucket(7.5, 3.0)]), vec![0.0, 7.5]);
    }

    #[test]
    fn test_bins_equal_width_from_last_gap() {
        let buckets = vec![bucket(5.0, 1.0), bucket(10.0, 2.0), bucket(25.0, 3.0)];
        let edges = bins(&buckets);
        let expected = [10.0, 25.0].map(|e: f64| e + EDGE_OFFSET);
        assert_eq!(edges, expected.to_vec());
    }

    #[test]
    fn test_bins_reach_zero() {
        let buckets = vec![bucket(10.0, 1.0), bucket(20.0, 2.0)];
        let edges = bins(&buckets);
        let expected = [0.0, 10.0, 20.0].map(|e: f64| e + EDGE_OFFSET);
        assert_eq!(edges, expected.to_vec());
    }

    #[test]
    fn test_bins_fractional_bounds() {
        // width truncates to zero, which is raised to one
        let buckets = vec![bucket(2.5, 1.0), bucket(2.75, 1.0)];
        let edges = bins(&buckets);
        let expected = [0.0, 1.0, 2.0, 3.0].map(|e: f64| e + EDGE_OFFSET);
        assert_eq!(edges, expected.to_vec());
    }

    #[test]
    fn test_weighted_histogram() {
        let buckets = vec![
            bucket(5.0, 1.0),
            bucket(10.0, 2.0),
            bucket(15.0, 4.0),
            bucket(20.0, 8.0),
        ];
        let edges = bins(&buckets);
        assert_eq!(edges.len(), 5);
        // 5 -> [0,5), 10 -> [5,10), 15 -> [10,15), 20 -> [15,20]
        assert_eq!(weighted_histogram(&buckets, &edges), vec![1.0, 2.0, 4.0, 8.0]);
    }

    #[test]
    fn test_weighted_histogram_ignores_outside() {
        let edges = vec![10.0, 20.0, 30.0];
        let buckets = vec![bucket(5.0, 1.0), bucket(30.0, 2.0), bucket(31.0, 4.0)];
        assert_eq!(weighted_histogram(&buckets, &edges), vec![0.0, 2.0]);
    }

    #[test]
    fn test_weighted_histogram_no_edges() {
        assert!(weighted_histogram(&[bucket(1.0, 1.0)], &[]).is_empty());
    }
}
