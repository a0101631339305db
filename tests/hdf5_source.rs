#![cfg(feature = "hdf5")]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use muon_hist::data::filter::partition;
use muon_hist::data::loader::{projection, DatasetHandle, LoadError};
use muon_hist::data::model::Column;
use muon_hist::data::sample::{generate, write_hdf5, MuonRecord};
use muon_hist::{run, Config};

fn write_sample(dir: &Path, records: &[MuonRecord]) -> PathBuf {
    let path = dir.join("maya.h5");
    write_hdf5(&path, "muons", records).unwrap();
    path
}

fn muon(pt: f32, class: i32) -> MuonRecord {
    MuonRecord {
        pt,
        eta: 0.5,
        phi: -1.0,
        iffClass: class,
    }
}

#[test]
fn reads_projected_fields_in_batches() {
    let dir = tempfile::tempdir().unwrap();
    let records = generate(1_234, 3);
    let path = write_sample(dir.path(), &records);

    // Batch size that does not divide the row count.
    let handle = DatasetHandle::new(&path, "muons", 100);
    let tables = handle
        .load(&projection("muons", &["iffClass", "pt"]), 100_000)
        .unwrap();
    let table = &tables["muons"];

    assert_eq!(table.len(), records.len());
    assert_eq!(table.column_names(), ["iffClass", "pt"]);
    let expected_classes: Vec<i64> = records.iter().map(|m| m.iffClass as i64).collect();
    assert_eq!(table.column("iffClass"), Some(&Column::Integer(expected_classes)));
    let expected_pt: Vec<f64> = records.iter().map(|m| m.pt as f64).collect();
    assert_eq!(table.column("pt"), Some(&Column::Float(expected_pt)));
}

#[test]
fn row_cap_truncates() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample(dir.path(), &generate(500, 1));
    let handle = DatasetHandle::new(&path, "muons", 1_000);
    let tables = handle.load(&projection("muons", &["pt"]), 120).unwrap();
    assert_eq!(tables["muons"].len(), 120);
}

#[test]
fn ten_row_label_split() {
    let dir = tempfile::tempdir().unwrap();
    let classes = [4, 4, 4, 5, 5, 6, 6, 6, 6, 6];
    let records: Vec<MuonRecord> = classes
        .iter()
        .enumerate()
        .map(|(i, &c)| muon(10_000.0 + i as f32, c))
        .collect();
    let path = write_sample(dir.path(), &records);

    let handle = DatasetHandle::new(&path, "muons", 4);
    let tables = handle
        .load(&projection("muons", &["pt", "eta", "phi", "iffClass"]), 100_000)
        .unwrap();
    let split = partition(&tables["muons"], "iffClass", 4).unwrap();
    assert_eq!(split.matching.len(), 3);
    assert_eq!(split.rest.len(), 7);
}

#[test]
fn missing_collection_and_field_fail_fast() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample(dir.path(), &generate(10, 9));

    let handle = DatasetHandle::new(&path, "jets", 100);
    let err = handle.load(&projection("jets", &["pt"]), 10).unwrap_err();
    assert!(matches!(err, LoadError::CollectionNotFound { ref collection, .. } if collection == "jets"));

    let handle = DatasetHandle::new(&path, "muons", 100);
    let err = handle.load(&projection("muons", &["truthType"]), 10).unwrap_err();
    assert!(matches!(err, LoadError::FieldNotFound { ref field, .. } if field == "truthType"));

    let mut two = BTreeMap::new();
    two.insert("muons".to_string(), vec!["pt".to_string()]);
    two.insert("tracks".to_string(), vec!["pt".to_string()]);
    let err = handle.load(&two, 10).unwrap_err();
    assert!(matches!(err, LoadError::CollectionNotFound { ref collection, .. } if collection == "tracks"));
}

#[test]
fn concurrent_writes_and_reads() {
    let dir = tempfile::tempdir().unwrap();
    std::thread::scope(|scope| {
        for seed in 0..4u64 {
            let dir = dir.path();
            scope.spawn(move || {
                let records = generate(300 + seed as usize * 50, seed);
                let path = dir.join(format!("muons_{seed}.h5"));
                write_hdf5(&path, "muons", &records).unwrap();

                let handle = DatasetHandle::new(&path, "muons", 64);
                for _ in 0..3 {
                    let tables = handle
                        .load(&projection("muons", &["pt", "iffClass"]), 100_000)
                        .unwrap();
                    let expected: Vec<f64> = records.iter().map(|m| m.pt as f64).collect();
                    assert_eq!(tables["muons"].column("pt"), Some(&Column::Float(expected)));
                }
            });
        }
    });
}

#[test]
fn default_pipeline_on_hdf5() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample(dir.path(), &generate(2_000, 11));
    let config = Config {
        input: path,
        output: dir.path().join("pt.png"),
        ..Config::default()
    };
    let summary = run(&config).unwrap();
    assert_eq!(summary.loaded, 2_000);
    assert_eq!(summary.matching + summary.rest, 2_000);
    assert!(std::fs::metadata(&config.output).unwrap().len() > 0);
}
