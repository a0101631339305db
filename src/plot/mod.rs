/// Rendering: bin a column per subset, draw the overlay, write the image.

pub mod histogram;
pub mod overlay;

pub use histogram::Histogram;
pub use overlay::{render_overlay, PlotStyle, Series};
