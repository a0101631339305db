use std::fmt;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Column – one fixed-width numeric field
// ---------------------------------------------------------------------------

/// Values of one record field. Integer sources stay integers so label
/// comparisons are exact; everything else is widened to `f64`.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Integer(Vec<i64>),
    /// Missing values are stored as `NaN`.
    Float(Vec<f64>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Integer(v) => v.len(),
            Column::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short dtype name used in log lines and error messages.
    pub fn dtype(&self) -> &'static str {
        match self {
            Column::Integer(_) => "int64",
            Column::Float(_) => "float64",
        }
    }

    /// Value at `row` as `f64`.
    ///
    /// Panics if `row` is out of bounds, like slice indexing.
    pub fn value_f64(&self, row: usize) -> f64 {
        match self {
            Column::Integer(v) => v[row] as f64,
            Column::Float(v) => v[row],
        }
    }

    /// Whether the value at `row` equals the integer `target`.
    /// `NaN` never compares equal.
    pub fn equals_i64(&self, row: usize, target: i64) -> bool {
        match self {
            Column::Integer(v) => v[row] == target,
            Column::Float(v) => v[row] == target as f64,
        }
    }

    /// Gather the rows at `rows` (in that order) into a new column.
    pub fn take(&self, rows: &[usize]) -> Column {
        match self {
            Column::Integer(v) => Column::Integer(rows.iter().map(|&r| v[r]).collect()),
            Column::Float(v) => Column::Float(rows.iter().map(|&r| v[r]).collect()),
        }
    }

    /// Append another column's values, widening to `Float` if the kinds differ.
    pub fn extend(&mut self, other: Column) {
        match other {
            Column::Integer(b) => match self {
                Column::Integer(a) => a.extend(b),
                Column::Float(a) => a.extend(b.into_iter().map(|i| i as f64)),
            },
            Column::Float(b) => {
                self.widen();
                if let Column::Float(a) = self {
                    a.extend(b);
                }
            }
        }
    }

    /// Convert in place to a `Float` column.
    pub fn widen(&mut self) {
        if let Column::Integer(v) = self {
            *self = Column::Float(v.iter().map(|&i| i as f64).collect());
        }
    }

    fn to_arrow(&self) -> (DataType, ArrayRef) {
        match self {
            Column::Integer(v) => (DataType::Int64, Arc::new(Int64Array::from(v.clone()))),
            Column::Float(v) => (DataType::Float64, Arc::new(Float64Array::from(v.clone()))),
        }
    }
}

// ---------------------------------------------------------------------------
// Table – the loaded records of one collection
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum ShapeError {
    #[error("column '{column}' has {found} rows, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),
}

/// An ordered set of equal-length named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Table {
    /// Build a table, checking names are unique and lengths agree.
    pub fn from_columns<I, S>(columns: I) -> Result<Self, ShapeError>
    where
        I: IntoIterator<Item = (S, Column)>,
        S: Into<String>,
    {
        let mut table = Table::default();
        for (name, column) in columns {
            table.push_column(name, column)?;
        }
        Ok(table)
    }

    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<(), ShapeError> {
        let name = name.into();
        if self.names.contains(&name) {
            return Err(ShapeError::DuplicateColumn(name));
        }
        if let Some(first) = self.columns.first() {
            if first.len() != column.len() {
                return Err(ShapeError::RaggedColumn {
                    column: name,
                    expected: first.len(),
                    found: column.len(),
                });
            }
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
    }

    /// Values of column `name` at `rows`, as `f64`.
    pub fn column_f64(&self, name: &str, rows: &[usize]) -> Option<Vec<f64>> {
        let column = self.column(name)?;
        Some(rows.iter().map(|&r| column.value_f64(r)).collect())
    }

    /// Copy the given rows into an owned table with the same columns.
    pub fn take(&self, rows: &[usize]) -> Table {
        Table {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
        }
    }

    /// Arrow view of the table, used for pretty-printing.
    pub fn to_record_batch(&self) -> Result<RecordBatch, ArrowError> {
        let mut fields = Vec::with_capacity(self.columns.len());
        let mut arrays = Vec::with_capacity(self.columns.len());
        for (name, column) in self.names.iter().zip(&self.columns) {
            let (dtype, array) = column.to_arrow();
            fields.push(Field::new(name, dtype, false));
            arrays.push(array);
        }
        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
    }

    /// The first `n` rows rendered as an ASCII table.
    pub fn preview(&self, n: usize) -> Result<String, ArrowError> {
        let head: Vec<usize> = (0..self.len().min(n)).collect();
        let batch = self.take(&head).to_record_batch()?;
        Ok(pretty_format_batches(&[batch])?.to_string())
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rows × [", self.len())?;
        for (i, (name, column)) in self.names.iter().zip(&self.columns).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {}", column.dtype())?;
        }
        write!(f, "]")
    }
}
