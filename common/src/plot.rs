//! Render histograms to SVG files.

use anyhow::{Result, anyhow};
use plotters::prelude::*;
use std::path::Path;

const CHART_SIZE: (u32, u32) = (640, 480);
const FONT_SIZE: u32 = 16;

/// Lowest value on a logarithmic y axis, so that bars of height one remain visible.
const LOG_FLOOR: f64 = 0.5;

/// Axis descriptions of a chart.
#[derive(Debug, Clone, Copy)]
pub struct Labels<'a> {
    pub x: &'a str,
    pub y: &'a str,
}

/// Sum weighted points into bins.
///
/// Bins are half-open except the last, which includes its upper edge. Points outside the
/// edges are not counted.
pub fn bin_weights(points: &[(f64, f64)], edges: &[f64]) -> Vec<f64> {
    let mut heights = vec![0.0; edges.len().saturating_sub(1)];
    let (Some(first), Some(last)) = (edges.first(), edges.last()) else {
        return heights;
    };
    let last_bin = heights.len().saturating_sub(1);
    for (value, weight) in points {
        if value < first || value > last {
            continue;
        }
        // index of the first edge strictly greater than the value
        let idx = edges.partition_point(|e| e <= value);
        if let Some(height) = heights.get_mut(idx.saturating_sub(1).min(last_bin)) {
            *height += weight;
        }
    }
    heights
}

/// Equal-width bin edges after Sturges' rule: `ceil(log2 n) + 1` bins spanning the data.
pub fn sturges_edges(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max <= min {
        return vec![min - 0.5, max + 0.5];
    }

    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let n_bins = (n.log2() + 1.0).ceil().max(1.0) as usize;
    #[allow(clippy::cast_precision_loss)]
    let edges = (0..=n_bins)
        .map(|i| min + (max - min) * i as f64 / n_bins as f64)
        .collect();
    edges
}

fn draw_err(e: impl std::fmt::Debug) -> anyhow::Error {
    anyhow!("Failed to draw chart: {e:?}")
}

/// One rectangle per non-empty bin, rising from `base`.
fn bars(edges: &[f64], heights: &[f64], base: f64) -> Vec<((f64, f64), (f64, f64))> {
    edges
        .windows(2)
        .zip(heights)
        .filter(|(_, h)| **h > 0.0)
        .map(|(edge, h)| ((edge[0], base), (edge[1], *h)))
        .collect()
}

/// Draw a histogram from precomputed bin edges and bar heights.
///
/// With `log_y` the y axis is logarithmic. Empty bins are left out either way.
///
/// # Errors
/// Returns an error if the chart cannot be drawn or the file cannot be written.
pub fn draw_histogram(
    path: &Path,
    edges: &[f64],
    heights: &[f64],
    labels: Labels,
    log_y: bool,
) -> Result<()> {
    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;

    let (x_min, x_max) = match (edges.first(), edges.last()) {
        (Some(a), Some(b)) if b > a => (*a, *b),
        _ => (0.0, 1.0),
    };
    let y_max = heights.iter().copied().fold(0.0, f64::max);

    let mut builder = ChartBuilder::on(&root);
    builder
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60);
    let fill = BLUE.mix(0.7).filled();
    let outline = WHITE.stroke_width(1);

    if log_y {
        let y_top = (y_max * 2.0).max(10.0);
        let mut chart = builder
            .build_cartesian_2d(x_min..x_max, (LOG_FLOOR..y_top).log_scale())
            .map_err(draw_err)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_desc(labels.x)
            .y_desc(labels.y)
            .label_style(("sans-serif", FONT_SIZE))
            .draw()
            .map_err(draw_err)?;
        let rects = bars(edges, heights, LOG_FLOOR);
        chart
            .draw_series(rects.iter().map(|(a, b)| Rectangle::new([*a, *b], fill)))
            .map_err(draw_err)?;
        chart
            .draw_series(rects.iter().map(|(a, b)| Rectangle::new([*a, *b], outline)))
            .map_err(draw_err)?;
    } else {
        let y_top = if y_max > 0.0 { y_max * 1.05 } else { 1.0 };
        let mut chart = builder
            .build_cartesian_2d(x_min..x_max, 0f64..y_top)
            .map_err(draw_err)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_desc(labels.x)
            .y_desc(labels.y)
            .label_style(("sans-serif", FONT_SIZE))
            .draw()
            .map_err(draw_err)?;
        let rects = bars(edges, heights, 0.0);
        chart
            .draw_series(rects.iter().map(|(a, b)| Rectangle::new([*a, *b], fill)))
            .map_err(draw_err)?;
        chart
            .draw_series(rects.iter().map(|(a, b)| Rectangle::new([*a, *b], outline)))
            .map_err(draw_err)?;
    }

    root.present().map_err(draw_err)?;
    Ok(())
}

/// Plot the distribution of a list of values using Sturges' rule for the bins.
///
/// # Errors
/// Returns an error if the chart cannot be drawn or the file cannot be written.
pub fn draw_value_histogram(path: &Path, values: &[f64], labels: Labels) -> Result<()> {
    let edges = sturges_edges(values);
    let points: Vec<(f64, f64)> = values.iter().map(|v| (*v, 1.0)).collect();
    let heights = bin_weights(&points, &edges);
    draw_histogram(path, &edges, &heights, labels, false)
}
