use thiserror::Error;

use super::model::Table;

// ---------------------------------------------------------------------------
// Label partition: rows equal to a class code vs. everything else
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("label column '{column}' not in table (columns: {available:?})")]
    ColumnNotFound {
        column: String,
        available: Vec<String>,
    },
}

/// Row indices of a table split by an equality predicate.
///
/// `matching` and `rest` are disjoint, ascending, and together cover
/// every row exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub matching: Vec<usize>,
    pub rest: Vec<usize>,
}

impl Partition {
    /// Total number of rows covered.
    pub fn len(&self) -> usize {
        self.matching.len() + self.rest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Split `table` into rows where `column == target` and rows where it is not.
///
/// Missing labels (`NaN` in a float column) are never equal to the target
/// and therefore end up in `rest`.
pub fn partition(table: &Table, column: &str, target: i64) -> Result<Partition, FilterError> {
    let labels = table
        .column(column)
        .ok_or_else(|| FilterError::ColumnNotFound {
            column: column.to_string(),
            available: table.column_names().to_vec(),
        })?;

    let mut split = Partition::default();
    for row in 0..labels.len() {
        if labels.equals_i64(row, target) {
            split.matching.push(row);
        } else {
            split.rest.push(row);
        }
    }
    Ok(split)
}
