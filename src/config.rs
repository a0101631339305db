use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::loader::{projection, DatasetHandle, Projection};
use crate::plot::PlotStyle;

// ---------------------------------------------------------------------------
// Run configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("`bins` must be at least 1")]
    ZeroBins,
    #[error("`batch_size` must be at least 1")]
    ZeroBatchSize,
    #[error("`columns` is empty")]
    NoColumns,
    #[error("`{key}` = '{column}' is not one of the loaded `columns`")]
    ColumnNotLoaded { key: &'static str, column: String },
    #[error("`alpha` must be within 0..=1, got {0}")]
    InvalidAlpha(f64),
    #[error("image size must be non-zero, got {0}x{1}")]
    InvalidSize(u32, u32),
}

/// Everything the pipeline needs. Defaults reproduce the muon `pt` plot.
///
/// Loaded from JSON; absent keys keep their defaults:
///
/// ```json
/// { "input": "sample_muons.parquet", "max_rows": 5000, "bins": 50 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub input: PathBuf,
    pub collection: String,
    pub columns: Vec<String>,
    pub batch_size: usize,
    pub max_rows: usize,
    pub label_column: String,
    pub label_value: i64,
    /// Legend labels for the matching and the remaining rows.
    pub labels: [String; 2],
    pub plot_column: String,
    pub bins: usize,
    /// Bin both subsets over their combined range instead of each its own.
    pub shared_range: bool,
    pub output: PathBuf,
    pub alpha: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: PathBuf::from("maya.h5"),
            collection: "muons".to_string(),
            columns: ["pt", "eta", "phi", "iffClass"].map(String::from).to_vec(),
            batch_size: 1_000,
            max_rows: 100_000,
            label_column: "iffClass".to_string(),
            label_value: 4,
            labels: ["prompt".to_string(), "nonprompt".to_string()],
            plot_column: "pt".to_string(),
            bins: 100,
            shared_range: false,
            output: PathBuf::from("pt.png"),
            alpha: 0.5,
            width: 800,
            height: 600,
        }
    }
}

impl Config {
    /// Read and validate a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bins == 0 {
            return Err(ConfigError::ZeroBins);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.columns.is_empty() {
            return Err(ConfigError::NoColumns);
        }
        for (key, column) in [("label_column", &self.label_column), ("plot_column", &self.plot_column)] {
            if !self.columns.contains(column) {
                return Err(ConfigError::ColumnNotLoaded {
                    key,
                    column: column.clone(),
                });
            }
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(ConfigError::InvalidAlpha(self.alpha));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidSize(self.width, self.height));
        }
        Ok(())
    }

    pub fn dataset(&self) -> DatasetHandle {
        DatasetHandle::new(&self.input, &self.collection, self.batch_size)
    }

    pub fn projection(&self) -> Projection {
        projection(&self.collection, &self.columns)
    }

    pub fn plot_style(&self) -> PlotStyle {
        PlotStyle {
            width: self.width,
            height: self.height,
            x_label: self.plot_column.clone(),
            alpha: self.alpha,
            ..PlotStyle::default()
        }
    }
}
