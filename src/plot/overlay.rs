use std::path::Path;

use anyhow::{Context, Result};
use image::{ImageFormat, RgbImage};
use log::debug;
use plotters::prelude::*;

use super::histogram::Histogram;
use crate::color::generate_palette;

// ---------------------------------------------------------------------------
// Overlaid histogram image
// ---------------------------------------------------------------------------

/// One labelled histogram to draw.
#[derive(Debug, Clone, Copy)]
pub struct Series<'a> {
    pub label: &'a str,
    pub histogram: &'a Histogram,
}

/// Canvas size, axis titles and fill opacity.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub x_label: String,
    pub y_label: String,
    /// Fill opacity of each series, `0.0..=1.0`.
    pub alpha: f64,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            x_label: String::new(),
            y_label: "Frequency".to_string(),
            alpha: 0.5,
        }
    }
}

/// Draw `series` as overlapping semi-transparent step histograms with a
/// legend in the upper right, and write the PNG to `path`, replacing any
/// existing file.
pub fn render_overlay(path: &Path, series: &[Series<'_>], style: &PlotStyle) -> Result<()> {
    let (width, height) = (style.width, style.height);
    let mut pixels = vec![0u8; width as usize * height as usize * 3];

    let (x_lo, x_hi) = series
        .iter()
        .map(|s| s.histogram.range())
        .reduce(|(a_lo, a_hi), (b_lo, b_hi)| (a_lo.min(b_lo), a_hi.max(b_hi)))
        .unwrap_or((0.0, 1.0));
    let y_max = series
        .iter()
        .map(|s| s.histogram.max_count())
        .max()
        .unwrap_or(0)
        .max(1) as f64
        * 1.05;
    debug!("plot frame x: [{x_lo}, {x_hi}], y: [0, {y_max}]");

    {
        let root = BitMapBackend::with_buffer(&mut pixels, (width, height)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(65)
            .build_cartesian_2d(x_lo..x_hi, 0.0..y_max)?;

        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc(style.x_label.as_str())
            .y_desc(style.y_label.as_str())
            .draw()?;

        let colours = generate_palette(series.len());
        for (s, colour) in series.iter().zip(colours) {
            let fill = colour.mix(style.alpha);
            chart
                .draw_series(s.histogram.iter_bins().map(|(lo, hi, count)| {
                    Rectangle::new([(lo, 0.0), (hi, count as f64)], fill.filled())
                }))?
                .label(s.label)
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], fill.filled()));
            chart.draw_series(std::iter::once(PathElement::new(
                s.histogram.step_outline(),
                colour.stroke_width(1),
            )))?;
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;

        root.present()?;
    }

    let image = RgbImage::from_raw(width, height, pixels)
        .context("plot buffer does not match the canvas size")?;
    image
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
