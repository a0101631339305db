use std::path::PathBuf;

use anyhow::Result;
use log::info;

use muon_hist::{run, Config};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Optional single argument: path to a JSON config file.
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => {
            info!("using config {}", path.display());
            Config::from_json_file(&path)?
        }
        None => Config::default(),
    };

    let summary = run(&config)?;
    info!(
        "{} rows plotted ({} {}, {} {}) → {}",
        summary.loaded,
        summary.matching,
        config.labels[0],
        summary.rest,
        config.labels[1],
        summary.output.display()
    );
    Ok(())
}
