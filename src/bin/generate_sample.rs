use std::path::Path;

use anyhow::Result;

use muon_hist::data::sample::{generate, write_parquet};

const N_MUONS: usize = 20_000;
const COLLECTION: &str = "muons";

fn main() -> Result<()> {
    let muons = generate(N_MUONS, 42);

    let output_path = Path::new("sample_muons.parquet");
    write_parquet(output_path, COLLECTION, &muons)?;
    println!("Wrote {N_MUONS} {COLLECTION} to {}", output_path.display());

    #[cfg(feature = "hdf5")]
    {
        let output_path = Path::new("sample_muons.h5");
        muon_hist::data::sample::write_hdf5(output_path, COLLECTION, &muons)?;
        println!("Wrote {N_MUONS} {COLLECTION} to {}", output_path.display());
    }

    Ok(())
}
