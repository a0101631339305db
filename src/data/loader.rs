use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use arrow::error::ArrowError;
use log::{debug, info};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ProjectionMask;
use parquet::errors::ParquetError;
use thiserror::Error;

use super::model::{Column, ShapeError, Table};

/// Parquet key-value metadata entry naming the collection a file holds.
pub const COLLECTION_KEY: &str = "collection";

/// Requested fields per collection: `{collection: [field, ...]}`.
pub type Projection = BTreeMap<String, Vec<String>>;

/// Build a single-collection projection.
pub fn projection<S: AsRef<str>>(collection: &str, fields: &[S]) -> Projection {
    let fields = fields.iter().map(|f| f.as_ref().to_string()).collect();
    BTreeMap::from([(collection.to_string(), fields)])
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("input file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("unsupported input format: {0}")]
    UnsupportedFormat(String),
    #[error("batch size must be at least 1")]
    ZeroBatchSize,
    #[error("collection '{collection}' not found in {path}")]
    CollectionNotFound { collection: String, path: PathBuf },
    #[error("collection '{collection}' has no field '{field}'")]
    FieldNotFound { collection: String, field: String },
    #[error("field '{collection}.{field}' has non-numeric type {dtype}")]
    UnsupportedType {
        collection: String,
        field: String,
        dtype: String,
    },
    #[error("collection '{collection}' is not a table of records: {reason}")]
    NotATable { collection: String, reason: String },
    #[error("collection '{collection}' has {available} rows, {expected} needed to align with the primary collection")]
    Misaligned {
        collection: String,
        available: usize,
        expected: usize,
    },
    #[error("'{collection}.{field}' row {row}: '{value}' is not a number")]
    InvalidValue {
        collection: String,
        field: String,
        row: usize,
        value: String,
    },
    #[error("failed reading '{collection}.{field}' rows {start}..{end}")]
    Read {
        collection: String,
        field: String,
        start: usize,
        end: usize,
    },
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("HDF5 error: {0}")]
    Hdf5(String),
    #[error("parquet error: {0}")]
    Parquet(#[from] ParquetError),
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[cfg(feature = "hdf5")]
impl From<hdf5::Error> for LoadError {
    fn from(e: hdf5::Error) -> Self {
        LoadError::Hdf5(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Dataset handle – public entry-point
// ---------------------------------------------------------------------------

/// A file, the primary collection inside it, and the read batch size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetHandle {
    path: PathBuf,
    collection: String,
    batch_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Hdf5,
    Parquet,
    Csv,
}

impl SourceFormat {
    fn from_path(path: &Path) -> Result<Self, LoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "h5" | "hdf5" => Ok(SourceFormat::Hdf5),
            "parquet" | "pq" => Ok(SourceFormat::Parquet),
            "csv" => Ok(SourceFormat::Csv),
            other => Err(LoadError::UnsupportedFormat(format!(".{other}"))),
        }
    }
}

impl DatasetHandle {
    pub fn new(path: impl Into<PathBuf>, collection: impl Into<String>, batch_size: usize) -> Self {
        DatasetHandle {
            path: path.into(),
            collection: collection.into(),
            batch_size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Read at most `max_rows` rows of the projected fields.
    ///
    /// Returns one table per requested collection, with columns in the
    /// requested order. The file is opened here and closed before returning.
    ///
    /// Supported formats (by extension):
    /// * `.h5` / `.hdf5` – 1-D datasets of compound records (needs the `hdf5` feature)
    /// * `.parquet`      – one collection per file, fields are top-level columns
    /// * `.csv`          – one collection per file, header row names the fields
    pub fn load(&self, projection: &Projection, max_rows: usize) -> Result<BTreeMap<String, Table>, LoadError> {
        if self.batch_size == 0 {
            return Err(LoadError::ZeroBatchSize);
        }
        if !self.path.is_file() {
            return Err(LoadError::FileNotFound(self.path.clone()));
        }

        let tables = match SourceFormat::from_path(&self.path)? {
            #[cfg(feature = "hdf5")]
            SourceFormat::Hdf5 => super::hdf5_source::load(self, projection, max_rows)?,
            #[cfg(not(feature = "hdf5"))]
            SourceFormat::Hdf5 => {
                return Err(LoadError::UnsupportedFormat(
                    "HDF5 input requires the `hdf5` feature".into(),
                ))
            }
            SourceFormat::Parquet => load_parquet(self, projection, max_rows)?,
            SourceFormat::Csv => load_csv(self, projection, max_rows)?,
        };

        for (collection, table) in &tables {
            if table.len() < max_rows {
                debug!("short read of '{collection}': {} of {max_rows} requested rows", table.len());
            }
            info!("loaded '{collection}' from {}: {table}", self.path.display());
        }
        Ok(tables)
    }

    fn collection_not_found(&self, collection: &str) -> LoadError {
        LoadError::CollectionNotFound {
            collection: collection.to_string(),
            path: self.path.clone(),
        }
    }
}

/// For single-collection formats: check that every requested collection
/// is the one the file holds and return the requested fields.
fn single_collection<'p>(
    handle: &DatasetHandle,
    file_collection: &str,
    projection: &'p Projection,
) -> Result<&'p [String], LoadError> {
    if handle.collection() != file_collection {
        return Err(handle.collection_not_found(handle.collection()));
    }
    if let Some(other) = projection.keys().find(|c| c.as_str() != file_collection) {
        return Err(handle.collection_not_found(other));
    }
    Ok(projection
        .get(file_collection)
        .map(Vec::as_slice)
        .unwrap_or_default())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// The collection name comes from the `collection` key-value metadata
/// entry, or the file stem when absent.
fn load_parquet(
    handle: &DatasetHandle,
    projection: &Projection,
    max_rows: usize,
) -> Result<BTreeMap<String, Table>, LoadError> {
    let file = File::open(handle.path())?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    let collection = builder
        .metadata()
        .file_metadata()
        .key_value_metadata()
        .and_then(|kv| kv.iter().find(|e| e.key == COLLECTION_KEY))
        .and_then(|e| e.value.clone())
        .unwrap_or_else(|| file_stem(handle.path()));
    let fields = single_collection(handle, &collection, projection)?;

    let schema = builder.schema().clone();
    let mut roots = Vec::with_capacity(fields.len());
    let mut empty = Vec::with_capacity(fields.len());
    for field in fields {
        let idx = schema.index_of(field).map_err(|_| LoadError::FieldNotFound {
            collection: collection.clone(),
            field: field.clone(),
        })?;
        let dtype = schema.field(idx).data_type();
        if !is_numeric(dtype) {
            return Err(LoadError::UnsupportedType {
                collection: collection.clone(),
                field: field.clone(),
                dtype: dtype.to_string(),
            });
        }
        roots.push(idx);
        empty.push(if dtype.is_floating() {
            Column::Float(Vec::new())
        } else {
            Column::Integer(Vec::new())
        });
    }

    let mask = ProjectionMask::roots(builder.parquet_schema(), roots);
    let reader = builder
        .with_projection(mask)
        .with_batch_size(handle.batch_size())
        .with_limit(max_rows)
        .build()?;

    let mut columns: Vec<Option<Column>> = vec![None; fields.len()];
    for (batch_no, batch_result) in reader.enumerate() {
        let batch = batch_result?;
        debug!("'{collection}' batch {batch_no}: {} rows", batch.num_rows());
        for (slot, field) in columns.iter_mut().zip(fields) {
            let array = batch
                .column_by_name(field)
                .ok_or_else(|| LoadError::FieldNotFound {
                    collection: collection.clone(),
                    field: field.clone(),
                })?;
            let values = column_from_array(array)?;
            match slot {
                Some(column) => column.extend(values),
                None => *slot = Some(values),
            }
        }
    }

    let table = Table::from_columns(
        fields
            .iter()
            .zip(columns.into_iter().zip(empty))
            .map(|(field, (column, empty))| (field.clone(), column.unwrap_or(empty))),
    )?;
    Ok(BTreeMap::from([(collection, table)]))
}

fn is_numeric(dtype: &DataType) -> bool {
    dtype.is_integer() || dtype.is_floating()
}

/// Convert an Arrow array to a [`Column`]. Integer arrays with nulls are
/// widened to `Float` so the nulls can become `NaN`.
fn column_from_array(array: &ArrayRef) -> Result<Column, ArrowError> {
    if array.data_type().is_integer() {
        let widened = cast(array, &DataType::Int64)?;
        let ints = widened.as_primitive::<Int64Type>();
        if ints.null_count() > 0 {
            Ok(Column::Float(
                ints.iter().map(|v| v.map_or(f64::NAN, |i| i as f64)).collect(),
            ))
        } else {
            Ok(Column::Integer(ints.values().to_vec()))
        }
    } else {
        let widened = cast(array, &DataType::Float64)?;
        let floats = widened.as_primitive::<Float64Type>();
        Ok(Column::Float(
            floats.iter().map(|v| v.unwrap_or(f64::NAN)).collect(),
        ))
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with field names, one record per row.
/// The collection is named after the file stem. Empty cells are missing
/// values and turn the column into `Float` with `NaN`.
fn load_csv(
    handle: &DatasetHandle,
    projection: &Projection,
    max_rows: usize,
) -> Result<BTreeMap<String, Table>, LoadError> {
    let collection = file_stem(handle.path());
    let fields = single_collection(handle, &collection, projection)?;

    let mut reader = csv::Reader::from_path(handle.path())?;
    let headers = reader.headers()?.clone();
    let positions = fields
        .iter()
        .map(|field| {
            headers
                .iter()
                .position(|h| h.trim() == field)
                .ok_or_else(|| LoadError::FieldNotFound {
                    collection: collection.clone(),
                    field: field.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut columns = vec![Column::Integer(Vec::new()); fields.len()];
    let mut record = csv::StringRecord::new();
    let mut rows = 0;
    while rows < max_rows && reader.read_record(&mut record)? {
        for ((column, &pos), field) in columns.iter_mut().zip(&positions).zip(fields) {
            let raw = record.get(pos).unwrap_or("").trim();
            if !push_csv_value(column, raw) {
                return Err(LoadError::InvalidValue {
                    collection: collection.clone(),
                    field: field.clone(),
                    row: rows,
                    value: raw.to_string(),
                });
            }
        }
        rows += 1;
        if rows % handle.batch_size() == 0 {
            debug!("'{collection}': {rows} rows read");
        }
    }

    let table = Table::from_columns(fields.iter().cloned().zip(columns))?;
    Ok(BTreeMap::from([(collection, table)]))
}

/// Append one cell; returns `false` if it is not a number.
fn push_csv_value(column: &mut Column, raw: &str) -> bool {
    if let Column::Integer(values) = column {
        if let Ok(i) = raw.parse::<i64>() {
            values.push(i);
            return true;
        }
    }
    let value = if raw.is_empty() {
        f64::NAN
    } else {
        match raw.parse::<f64>() {
            Ok(v) => v,
            Err(_) => return false,
        }
    };
    column.widen();
    if let Column::Float(values) = column {
        values.push(value);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::partition;
    use arrow::array::{Float64Array, Int32Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use std::io::Write;
    use std::sync::Arc;

    fn write_csv(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        write!(f, "{body}").unwrap();
        path
    }

    /// Parquet file named `muons.parquet` without collection metadata,
    /// so the collection is the file stem.
    fn write_parquet(dir: &Path, columns: Vec<(&str, ArrayRef)>) -> PathBuf {
        let fields: Vec<Field> = columns
            .iter()
            .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
            .collect();
        let arrays = columns.into_iter().map(|(_, array)| array).collect();
        let schema = Arc::new(Schema::new(fields));
        let batch = RecordBatch::try_new(schema.clone(), arrays).unwrap();

        let path = dir.join("muons.parquet");
        let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        path
    }

    const MUONS: &str = "pt,eta,phi,iffClass\n\
                         25000.5,0.1,1.0,4\n\
                         31000,-1.2,0.5,8\n\
                         18000.25,2.0,-2.9,4\n";

    #[test]
    fn csv_projection_keeps_requested_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "muons.csv", MUONS);
        let handle = DatasetHandle::new(&path, "muons", 2);
        let tables = handle
            .load(&projection("muons", &["iffClass", "pt"]), 100)
            .unwrap();
        let table = &tables["muons"];
        assert_eq!(table.column_names(), ["iffClass", "pt"]);
        assert_eq!(table.column("iffClass"), Some(&Column::Integer(vec![4, 8, 4])));
        assert_eq!(
            table.column("pt"),
            Some(&Column::Float(vec![25000.5, 31000.0, 18000.25]))
        );
    }

    #[test]
    fn csv_row_cap_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "muons.csv", MUONS);
        let handle = DatasetHandle::new(&path, "muons", 1);
        let tables = handle.load(&projection("muons", &["pt"]), 2).unwrap();
        assert_eq!(tables["muons"].len(), 2);
    }

    #[test]
    fn csv_empty_cells_become_nan() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "muons.csv", "pt,iffClass\n1.0,4\n2.0,\n");
        let handle = DatasetHandle::new(&path, "muons", 10);
        let tables = handle.load(&projection("muons", &["iffClass"]), 10).unwrap();
        match tables["muons"].column("iffClass") {
            Some(Column::Float(v)) => {
                assert_eq!(v[0], 4.0);
                assert!(v[1].is_nan());
            }
            other => panic!("expected float column, got {other:?}"),
        }
    }

    #[test]
    fn csv_non_numeric_cell_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "muons.csv", "pt\n1.0\nabc\n");
        let handle = DatasetHandle::new(&path, "muons", 10);
        let err = handle.load(&projection("muons", &["pt"]), 10).unwrap_err();
        assert!(matches!(
            err,
            LoadError::InvalidValue { row: 1, ref value, .. } if value == "abc"
        ));
    }

    #[test]
    fn missing_file_fails_fast() {
        let handle = DatasetHandle::new("/nonexistent/maya.h5", "muons", 1000);
        let err = handle.load(&projection("muons", &["pt"]), 10).unwrap_err();
        assert!(matches!(err, LoadError::FileNotFound(_)));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let handle = DatasetHandle::new("muons.csv", "muons", 0);
        let err = handle.load(&projection("muons", &["pt"]), 10).unwrap_err();
        assert!(matches!(err, LoadError::ZeroBatchSize));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "muons.txt", MUONS);
        let handle = DatasetHandle::new(&path, "muons", 10);
        let err = handle.load(&projection("muons", &["pt"]), 10).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(ref e) if e == ".txt"));
    }

    #[test]
    fn csv_wrong_collection_and_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "muons.csv", MUONS);

        let handle = DatasetHandle::new(&path, "electrons", 10);
        let err = handle.load(&projection("electrons", &["pt"]), 10).unwrap_err();
        assert!(matches!(err, LoadError::CollectionNotFound { ref collection, .. } if collection == "electrons"));

        let handle = DatasetHandle::new(&path, "muons", 10);
        let err = handle.load(&projection("muons", &["d0"]), 10).unwrap_err();
        assert!(matches!(err, LoadError::FieldNotFound { ref field, .. } if field == "d0"));
    }

    #[test]
    fn parquet_integer_nulls_become_nan() {
        let dir = tempfile::tempdir().unwrap();
        let classes: ArrayRef = Arc::new(Int32Array::from(vec![Some(4), Some(5), Some(4), None, Some(4)]));
        let pt: ArrayRef = Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0, 4.0, 5.0]));
        let path = write_parquet(dir.path(), vec![("pt", pt), ("iffClass", classes)]);

        // The null sits in the second batch, after an all-valid first batch.
        let handle = DatasetHandle::new(&path, "muons", 2);
        let tables = handle
            .load(&projection("muons", &["pt", "iffClass"]), 100)
            .unwrap();
        let table = &tables["muons"];
        match table.column("iffClass") {
            Some(Column::Float(v)) => {
                assert_eq!(v.len(), 5);
                assert_eq!([v[0], v[1], v[2], v[4]], [4.0, 5.0, 4.0, 4.0]);
                assert!(v[3].is_nan());
            }
            other => panic!("expected float column, got {other:?}"),
        }

        let split = partition(table, "iffClass", 4).unwrap();
        assert_eq!(split.matching, vec![0, 2, 4]);
        assert_eq!(split.rest, vec![1, 3]);
    }

    #[test]
    fn parquet_zero_rows_keeps_requested_columns() {
        let dir = tempfile::tempdir().unwrap();
        let classes: ArrayRef = Arc::new(Int32Array::from(vec![4, 8, 4]));
        let pt: ArrayRef = Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0]));
        let path = write_parquet(dir.path(), vec![("iffClass", classes), ("pt", pt)]);

        let handle = DatasetHandle::new(&path, "muons", 10);
        let tables = handle
            .load(&projection("muons", &["pt", "iffClass"]), 0)
            .unwrap();
        let table = &tables["muons"];
        assert_eq!(table.len(), 0);
        assert!(table.is_empty());
        assert_eq!(table.column_names(), ["pt", "iffClass"]);
    }

    #[test]
    fn parquet_text_field_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let pt: ArrayRef = Arc::new(Float64Array::from(vec![1.0, 2.0]));
        let name: ArrayRef = Arc::new(StringArray::from(vec!["mu-", "mu+"]));
        let path = write_parquet(dir.path(), vec![("pt", pt), ("name", name)]);

        let handle = DatasetHandle::new(&path, "muons", 10);
        let err = handle
            .load(&projection("muons", &["pt", "name"]), 10)
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::UnsupportedType { ref field, ref dtype, .. } if field == "name" && dtype == "Utf8"
        ));
    }
}
