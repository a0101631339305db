//! Synthetic muon samples for demos and tests.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float32Array, Int32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;

use super::loader::COLLECTION_KEY;

/// Truth-class code of a prompt muon.
pub const PROMPT_CLASS: i32 = 4;

/// Class codes and their relative frequency in generated samples.
const CLASS_MIX: [(i32, f64); 6] = [
    (PROMPT_CLASS, 0.60),
    (8, 0.15),
    (9, 0.10),
    (10, 0.08),
    (7, 0.05),
    (0, 0.02),
];

/// One muon record, laid out like the compound type of the HDF5 dataset.
#[allow(non_snake_case)]
#[cfg_attr(feature = "hdf5", derive(hdf5::H5Type))]
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct MuonRecord {
    pub pt: f32,
    pub eta: f32,
    pub phi: f32,
    pub iffClass: i32,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    /// Uniform in `[0, 1)`.
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    fn exponential(&mut self, mean: f64) -> f64 {
        -mean * (1.0 - self.next_f64()).ln()
    }

    fn class(&mut self) -> i32 {
        let mut u = self.next_f64();
        for &(class, weight) in &CLASS_MIX {
            if u < weight {
                return class;
            }
            u -= weight;
        }
        PROMPT_CLASS
    }
}

/// Generate `n` muons. `pt` is in MeV above a 5 GeV threshold; prompt
/// muons get a harder spectrum than heavy-flavour decays.
pub fn generate(n: usize, seed: u64) -> Vec<MuonRecord> {
    let mut rng = SimpleRng::new(seed);
    (0..n)
        .map(|_| {
            let class = rng.class();
            let mean_pt = if class == PROMPT_CLASS { 30_000.0 } else { 9_000.0 };
            MuonRecord {
                pt: (5_000.0 + rng.exponential(mean_pt)) as f32,
                eta: rng.uniform(-2.5, 2.5) as f32,
                phi: rng.uniform(-std::f64::consts::PI, std::f64::consts::PI) as f32,
                iffClass: class,
            }
        })
        .collect()
}

/// Write records as Parquet, tagging the file with its collection name.
pub fn write_parquet(path: &Path, collection: &str, records: &[MuonRecord]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("pt", DataType::Float32, false),
        Field::new("eta", DataType::Float32, false),
        Field::new("phi", DataType::Float32, false),
        Field::new("iffClass", DataType::Int32, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Float32Array::from_iter_values(records.iter().map(|r| r.pt))),
            Arc::new(Float32Array::from_iter_values(records.iter().map(|r| r.eta))),
            Arc::new(Float32Array::from_iter_values(records.iter().map(|r| r.phi))),
            Arc::new(Int32Array::from_iter_values(records.iter().map(|r| r.iffClass))),
        ],
    )
    .context("building record batch")?;

    let props = WriterProperties::builder()
        .set_key_value_metadata(Some(vec![KeyValue::new(
            COLLECTION_KEY.to_string(),
            collection.to_string(),
        )]))
        .build();

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, Some(props)).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

/// Write records as a 1-D compound dataset named `collection`.
#[cfg(feature = "hdf5")]
pub fn write_hdf5(path: &Path, collection: &str, records: &[MuonRecord]) -> Result<()> {
    let _guard = super::hdf5_source::lock();
    let written: hdf5::Result<()> = (|| {
        let file = hdf5::File::create(path)?;
        let dataset = file
            .new_dataset::<MuonRecord>()
            .shape(records.len())
            .create(collection)?;
        dataset.write_raw(records)
    })();
    written.map_err(|e| anyhow::anyhow!("writing '{collection}' to {}: {e}", path.display()))
}
