//! Load muon records from a columnar file, split them by truth class and
//! plot an overlaid histogram of one attribute.
//!
//! ```text
//!  DatasetHandle::load ──► data::filter::partition ──► plot::render_overlay
//!   (bounded, batched)      (label == target / !=)      (binned overlay → PNG)
//! ```

#![deny(unsafe_code)]

pub mod color;
pub mod config;
pub mod data;
pub mod pipeline;
pub mod plot;

pub use config::Config;
pub use pipeline::{run, RunSummary};
