use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::config::Config;
use crate::data::filter::{partition, Partition};
use crate::data::model::Table;
use crate::plot::histogram::{auto_range, finite_range};
use crate::plot::{render_overlay, Histogram, Series};

// ---------------------------------------------------------------------------
// Reader → Selector → Renderer
// ---------------------------------------------------------------------------

/// Row counts of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub loaded: usize,
    pub matching: usize,
    pub rest: usize,
    pub output: PathBuf,
}

/// Load, split and plot as described by `config`.
pub fn run(config: &Config) -> Result<RunSummary> {
    config.validate()?;

    let handle = config.dataset();
    let mut tables = handle
        .load(&config.projection(), config.max_rows)
        .with_context(|| format!("loading '{}' from {}", config.collection, config.input.display()))?;
    let table = tables
        .remove(&config.collection)
        .with_context(|| format!("no table returned for '{}'", config.collection))?;
    if log::log_enabled!(log::Level::Debug) {
        debug!("first rows:\n{}", table.preview(5)?);
    }

    let split = select(&table, config)?;
    render(&table, &split, config)?;

    Ok(RunSummary {
        loaded: table.len(),
        matching: split.matching.len(),
        rest: split.rest.len(),
        output: config.output.clone(),
    })
}

/// Split the table on `label_column == label_value`.
pub fn select(table: &Table, config: &Config) -> Result<Partition> {
    let split = partition(table, &config.label_column, config.label_value)?;
    info!(
        "{}: {} rows, {}: {} rows",
        config.labels[0],
        split.matching.len(),
        config.labels[1],
        split.rest.len()
    );
    for (label, rows) in config.labels.iter().zip([&split.matching, &split.rest]) {
        if rows.is_empty() {
            warn!("no '{label}' rows, its histogram will be empty");
        }
    }
    Ok(split)
}

/// Histogram `plot_column` for both subsets and write the overlay image.
pub fn render(table: &Table, split: &Partition, config: &Config) -> Result<()> {
    let column = &config.plot_column;
    let values = |rows: &[usize]| {
        table
            .column_f64(column, rows)
            .with_context(|| format!("plot column '{column}' not in table"))
    };
    let matching = values(&split.matching)?;
    let rest = values(&split.rest)?;

    let histograms = bin_subsets(&matching, &rest, config);

    let series: Vec<Series<'_>> = config
        .labels
        .iter()
        .zip(&histograms)
        .map(|(label, histogram)| Series { label, histogram })
        .collect();
    render_overlay(&config.output, &series, &config.plot_style())
        .with_context(|| format!("rendering {}", config.output.display()))?;
    info!("wrote {}", config.output.display());
    Ok(())
}

/// Bin both subsets, over their own ranges or over the combined range
/// when `shared_range` is set.
fn bin_subsets(matching: &[f64], rest: &[f64], config: &Config) -> [Histogram; 2] {
    if config.shared_range {
        let combined: Vec<f64> = matching.iter().chain(rest).copied().collect();
        let (lo, hi) = auto_range(finite_range(&combined));
        debug!("shared bin range [{lo}, {hi}]");
        [
            Histogram::with_range(matching, config.bins, lo, hi),
            Histogram::with_range(rest, config.bins, lo, hi),
        ]
    } else {
        [
            Histogram::from_values(matching, config.bins),
            Histogram::from_values(rest, config.bins),
        ]
    }
}
