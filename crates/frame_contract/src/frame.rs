//! Arrow-backed table values.
//!
//! A [`Frame`] is a `RecordBatch` plus a row index. The index defaults to a
//! 0..n Int64 range and travels with the rows through slicing and column
//! edits, so "same index" is a meaningful relation between two frames.

use arrow::array::{Array, ArrayRef, Int64Array};
use arrow::datatypes::{Field, FieldRef, Schema as ArrowSchema};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Frame {
    batch: RecordBatch,
    index: ArrayRef,
}

impl Frame {
    /// Wrap a record batch with a default range index.
    pub fn new(batch: RecordBatch) -> Self {
        let index = range_index(batch.num_rows());
        Self { batch, index }
    }

    /// Build a frame from named columns.
    pub fn from_columns<I, S>(columns: I) -> Result<Self, ArrowError>
    where
        I: IntoIterator<Item = (S, ArrayRef)>,
        S: AsRef<str>,
    {
        Ok(Self::new(RecordBatch::try_from_iter(columns)?))
    }

    /// A frame with `rows` rows and no columns.
    pub fn empty(rows: usize) -> Result<Self, ArrowError> {
        let options = RecordBatchOptions::new().with_row_count(Some(rows));
        let batch =
            RecordBatch::try_new_with_options(Arc::new(ArrowSchema::empty()), vec![], &options)?;
        Ok(Self::new(batch))
    }

    /// Replace the row index. The index must have one label per row.
    pub fn with_index(mut self, index: ArrayRef) -> Result<Self, ArrowError> {
        if index.len() != self.batch.num_rows() {
            return Err(ArrowError::InvalidArgumentError(format!(
                "index has {} labels but frame has {} rows",
                index.len(),
                self.batch.num_rows()
            )));
        }
        self.index = index;
        Ok(self)
    }

    /// Return a copy with `name` set to `array`, replacing an existing column
    /// of that name or appending a new one.
    pub fn with_column(&self, name: &str, array: ArrayRef) -> Result<Self, ArrowError> {
        let schema = self.batch.schema();
        let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
        let mut columns = self.batch.columns().to_vec();
        let field = Arc::new(Field::new(name, array.data_type().clone(), true));

        match schema.index_of(name) {
            Ok(idx) => {
                fields[idx] = field;
                columns[idx] = array;
            }
            Err(_) => {
                fields.push(field);
                columns.push(array);
            }
        }

        let options = RecordBatchOptions::new().with_row_count(Some(self.batch.num_rows()));
        let batch =
            RecordBatch::try_new_with_options(Arc::new(ArrowSchema::new(fields)), columns, &options)?;
        Ok(Self {
            batch,
            index: Arc::clone(&self.index),
        })
    }

    /// Return a copy without the named columns. Unknown names are ignored.
    pub fn drop_columns(&self, names: &[&str]) -> Result<Self, ArrowError> {
        let keep: Vec<usize> = self
            .batch
            .schema()
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, field)| !names.contains(&field.name().as_str()))
            .map(|(idx, _)| idx)
            .collect();
        Ok(Self {
            batch: self.batch.project(&keep)?,
            index: Arc::clone(&self.index),
        })
    }

    /// A single-column frame sharing this frame's index.
    pub fn select_column(&self, name: &str) -> Option<Self> {
        let idx = self.batch.schema().index_of(name).ok()?;
        let batch = self.batch.project(&[idx]).ok()?;
        Some(Self {
            batch,
            index: Arc::clone(&self.index),
        })
    }

    /// Zero-copy row slice.
    pub fn slice(&self, offset: usize, length: usize) -> Self {
        Self {
            batch: self.batch.slice(offset, length),
            index: self.index.slice(offset, length),
        }
    }

    pub fn len(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema().index_of(name).is_ok()
    }

    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    pub fn index(&self) -> &ArrayRef {
        &self.index
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Order-sensitive comparison of row labels.
    pub fn index_equals(&self, other: &Frame) -> bool {
        self.index.to_data() == other.index.to_data()
    }

    /// Whether the named column holds the same typed values in both frames.
    pub fn column_equals(&self, other: &Frame, name: &str) -> bool {
        match (self.column(name), other.column(name)) {
            (Some(a), Some(b)) => a.to_data() == b.to_data(),
            _ => false,
        }
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.batch == other.batch && self.index_equals(other)
    }
}

fn range_index(rows: usize) -> ArrayRef {
    Arc::new(Int64Array::from_iter_values(0..rows as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, StringArray};

    fn ints(values: Vec<i64>) -> ArrayRef {
        Arc::new(Int64Array::from(values))
    }

    #[test]
    fn test_default_range_index() {
        let frame = Frame::from_columns(vec![("a", ints(vec![5, 6, 7]))]).unwrap();
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.index().to_data(), ints(vec![0, 1, 2]).to_data());
    }

    #[test]
    fn test_empty_keeps_row_count() {
        let frame = Frame::empty(2).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.num_columns(), 0);
    }

    #[test]
    fn test_with_index_rejects_wrong_length() {
        let frame = Frame::from_columns(vec![("a", ints(vec![1]))]).unwrap();
        assert!(frame.with_index(ints(vec![1, 2])).is_err());
    }

    #[test]
    fn test_with_column_appends_and_replaces() {
        let frame = Frame::from_columns(vec![("a", ints(vec![1, 2]))]).unwrap();
        let added = frame.with_column("b", ints(vec![3, 4])).unwrap();
        assert_eq!(added.column_names(), vec!["a", "b"]);

        let replaced = added
            .with_column("a", Arc::new(Float64Array::from(vec![1.0, 2.0])))
            .unwrap();
        assert_eq!(replaced.column_names(), vec!["a", "b"]);
        assert!(!replaced.column_equals(&frame, "a"));
        assert!(replaced.index_equals(&frame));
    }

    #[test]
    fn test_with_column_rejects_wrong_length() {
        let frame = Frame::from_columns(vec![("a", ints(vec![1, 2]))]).unwrap();
        assert!(frame.with_column("b", ints(vec![1])).is_err());
    }

    #[test]
    fn test_drop_columns() {
        let frame = Frame::from_columns(vec![
            ("a", ints(vec![1])),
            ("b", Arc::new(StringArray::from(vec!["x"])) as ArrayRef),
        ])
        .unwrap();
        let dropped = frame.drop_columns(&["a", "missing"]).unwrap();
        assert_eq!(dropped.column_names(), vec!["b"]);
        assert_eq!(dropped.len(), 1);
    }

    #[test]
    fn test_slice_moves_index() {
        let frame = Frame::from_columns(vec![("a", ints(vec![1, 2, 3]))]).unwrap();
        let tail = frame.slice(1, 2);
        assert_eq!(tail.index().to_data(), ints(vec![1, 2]).to_data());
        assert!(!tail.index_equals(&frame.slice(0, 2)));
    }
}
