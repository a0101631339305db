//! HDF5 input: each collection is a 1-D dataset of compound records.
//!
//! Fields are read one at a time through a single-member compound memory
//! type, so HDF5 picks the member out by name and converts it to a native
//! `i64`/`f64` while reading a hyperslab of `batch_size` rows.

use std::collections::BTreeMap;
use std::ptr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use hdf5::types::{CompoundField, CompoundType, FloatSize, IntSize, TypeDescriptor};
use hdf5::{Dataset, Datatype, File};
use hdf5_sys::h5::hsize_t;
use hdf5_sys::h5d::{H5Dget_space, H5Dread};
use hdf5_sys::h5p::H5P_DEFAULT;
use hdf5_sys::h5s::{H5S_seloper_t, H5Sclose, H5Screate_simple, H5Sselect_hyperslab};
use log::debug;

use super::loader::{DatasetHandle, LoadError, Projection};
use super::model::{Column, Table};

/// The raw reads below bypass the `hdf5` crate's own locking, so every
/// HDF5 access in this crate goes through this lock.
static HDF5_LOCK: Mutex<()> = Mutex::new(());

pub(crate) fn lock() -> MutexGuard<'static, ()> {
    HDF5_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Integer,
    Float,
}

/// One requested field: its name, kind and the memory type used to read it.
struct FieldReader {
    name: String,
    kind: FieldKind,
    mem_type: Datatype,
}

pub(super) fn load(
    handle: &DatasetHandle,
    projection: &Projection,
    max_rows: usize,
) -> Result<BTreeMap<String, Table>, LoadError> {
    let _guard = lock();
    let file = File::open(handle.path())?;

    let primary = open_collection(&file, handle, handle.collection())?;
    let n_rows = primary.shape()[0].min(max_rows);
    debug!(
        "'{}' holds {} rows, reading {n_rows} in batches of {}",
        handle.collection(),
        primary.shape()[0],
        handle.batch_size()
    );

    let mut tables = BTreeMap::new();
    for (collection, fields) in projection {
        let secondary;
        let dataset = if collection == handle.collection() {
            &primary
        } else {
            secondary = open_collection(&file, handle, collection)?;
            &secondary
        };
        let available = dataset.shape()[0];
        if available < n_rows {
            return Err(LoadError::Misaligned {
                collection: collection.clone(),
                available,
                expected: n_rows,
            });
        }
        let readers = field_readers(dataset, collection, fields)?;
        let table = read_table(dataset, collection, &readers, n_rows, handle.batch_size())?;
        tables.insert(collection.clone(), table);
    }
    Ok(tables)
}

fn open_collection(file: &File, handle: &DatasetHandle, name: &str) -> Result<Dataset, LoadError> {
    if !file.link_exists(name) {
        return Err(LoadError::CollectionNotFound {
            collection: name.to_string(),
            path: handle.path().to_path_buf(),
        });
    }
    let dataset = file.dataset(name).map_err(|e| LoadError::NotATable {
        collection: name.to_string(),
        reason: e.to_string(),
    })?;
    if dataset.ndim() != 1 {
        return Err(LoadError::NotATable {
            collection: name.to_string(),
            reason: format!("expected a 1-D dataset, found shape {:?}", dataset.shape()),
        });
    }
    Ok(dataset)
}

fn field_readers(dataset: &Dataset, collection: &str, fields: &[String]) -> Result<Vec<FieldReader>, LoadError> {
    let members = match dataset.dtype()?.to_descriptor()? {
        TypeDescriptor::Compound(compound) => compound.fields,
        other => {
            return Err(LoadError::NotATable {
                collection: collection.to_string(),
                reason: format!("records have non-compound type {other:?}"),
            })
        }
    };

    fields
        .iter()
        .map(|field| {
            let member = members
                .iter()
                .find(|m| &m.name == field)
                .ok_or_else(|| LoadError::FieldNotFound {
                    collection: collection.to_string(),
                    field: field.clone(),
                })?;
            let (kind, native) = match member.ty {
                TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => {
                    (FieldKind::Integer, TypeDescriptor::Integer(IntSize::U8))
                }
                TypeDescriptor::Float(_) => (FieldKind::Float, TypeDescriptor::Float(FloatSize::U8)),
                ref other => {
                    return Err(LoadError::UnsupportedType {
                        collection: collection.to_string(),
                        field: field.clone(),
                        dtype: format!("{other:?}"),
                    })
                }
            };
            let mem_type = Datatype::from_descriptor(&TypeDescriptor::Compound(CompoundType {
                fields: vec![CompoundField {
                    name: field.clone(),
                    ty: native,
                    offset: 0,
                    index: 0,
                }],
                size: 8,
            }))?;
            Ok(FieldReader {
                name: field.clone(),
                kind,
                mem_type,
            })
        })
        .collect()
}

fn read_table(
    dataset: &Dataset,
    collection: &str,
    readers: &[FieldReader],
    n_rows: usize,
    batch_size: usize,
) -> Result<Table, LoadError> {
    let mut columns: Vec<Column> = readers
        .iter()
        .map(|r| match r.kind {
            FieldKind::Integer => Column::Integer(Vec::with_capacity(n_rows)),
            FieldKind::Float => Column::Float(Vec::with_capacity(n_rows)),
        })
        .collect();

    for start in (0..n_rows).step_by(batch_size) {
        let count = batch_size.min(n_rows - start);
        for (reader, column) in readers.iter().zip(columns.iter_mut()) {
            let read_error = || LoadError::Read {
                collection: collection.to_string(),
                field: reader.name.clone(),
                start,
                end: start + count,
            };
            match column {
                Column::Integer(values) => {
                    let batch = read_hyperslab::<i64>(dataset, &reader.mem_type, start, count)
                        .ok_or_else(read_error)?;
                    values.extend(batch);
                }
                Column::Float(values) => {
                    let batch = read_hyperslab::<f64>(dataset, &reader.mem_type, start, count)
                        .ok_or_else(read_error)?;
                    values.extend(batch);
                }
            }
        }
        debug!("'{collection}' rows {start}..{} read", start + count);
    }

    let names = readers.iter().map(|r| r.name.clone());
    Ok(Table::from_columns(names.zip(columns))?)
}

/// Read rows `start..start + count` of one field. `mem_type` must be an
/// 8-byte type matching `T`.
#[allow(unsafe_code)]
fn read_hyperslab<T: Copy + Default>(
    dataset: &Dataset,
    mem_type: &Datatype,
    start: usize,
    count: usize,
) -> Option<Vec<T>> {
    let mut buffer = vec![T::default(); count];
    if count == 0 {
        return Some(buffer);
    }
    let offset = [start as hsize_t];
    let extent = [count as hsize_t];

    // SAFETY: `buffer` holds `count` values of `T`, which is exactly what a
    // 1-D memory space of `count` elements of `mem_type` describes. Every
    // dataspace id opened here is closed before returning.
    let status = unsafe {
        let file_space = H5Dget_space(dataset.id());
        if file_space < 0 {
            return None;
        }
        let mem_space = H5Screate_simple(1, extent.as_ptr(), ptr::null());
        let status = if mem_space < 0 {
            -1
        } else {
            let selected = H5Sselect_hyperslab(
                file_space,
                H5S_seloper_t::H5S_SELECT_SET,
                offset.as_ptr(),
                ptr::null(),
                extent.as_ptr(),
                ptr::null(),
            );
            if selected < 0 {
                selected
            } else {
                H5Dread(
                    dataset.id(),
                    mem_type.id(),
                    mem_space,
                    file_space,
                    H5P_DEFAULT,
                    buffer.as_mut_ptr().cast(),
                )
            }
        };
        if mem_space >= 0 {
            H5Sclose(mem_space);
        }
        H5Sclose(file_space);
        status
    };

    (status >= 0).then_some(buffer)
}
