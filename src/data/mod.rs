/// Data layer: core types, loading, and filtering.
///
/// Architecture:
/// ```text
///  .h5 / .parquet / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  bounded, batched, projected read → Table per collection
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Table    │  named numeric columns
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  label == target → (matching, rest) row indices
///   └──────────┘
/// ```

pub mod filter;
#[cfg(feature = "hdf5")]
mod hdf5_source;
pub mod loader;
pub mod model;
// `H5Type` derives expand to an `unsafe impl`.
#[cfg_attr(feature = "hdf5", allow(unsafe_code))]
pub mod sample;
