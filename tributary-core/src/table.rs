//! In-memory tables: one [`RawTable`] per fetched object and one
//! [`MergedTable`] per dataset.
//!
//! Every column is `Utf8`; values are kept exactly as they appear in the
//! source file, with empty cells as nulls.

use std::sync::Arc;

use arrow::{
    datatypes::{DataType, Field, Schema, SchemaRef},
    record_batch::RecordBatch,
};
use object_store::path::Path;

/// Builds the all-text schema for a header row.
pub fn text_schema<S: AsRef<str>>(columns: &[S]) -> SchemaRef {
    let fields: Vec<Field> = columns
        .iter()
        .map(|name| Field::new(name.as_ref(), DataType::Utf8, true))
        .collect();
    Arc::new(Schema::new(fields))
}

/// The decoded contents of a single object.
#[derive(Debug, Clone)]
pub struct RawTable {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
    num_rows: usize,
    source: Option<Path>,
}

impl RawTable {
    /// Wraps decoded batches. All batches must carry `schema`.
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        let num_rows = batches.iter().map(RecordBatch::num_rows).sum();
        Self {
            schema,
            batches,
            num_rows,
            source: None,
        }
    }

    /// Tags the table with the key of the object it was decoded from.
    pub fn with_source(mut self, location: Path) -> Self {
        self.source = Some(location);
        self
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_ref()
    }

    /// A table with neither columns nor rows.
    pub fn empty() -> Self {
        Self::new(Arc::new(Schema::empty()), vec![])
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn num_columns(&self) -> usize {
        self.schema.fields().len()
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn into_parts(self) -> (SchemaRef, Vec<RecordBatch>) {
        (self.schema, self.batches)
    }
}

/// All rows collected for one dataset.
#[derive(Debug)]
pub struct MergedTable {
    pub(crate) schema: SchemaRef,
    pub(crate) batches: Vec<RecordBatch>,
    pub(crate) num_rows: usize,
    pub(crate) source_tables: usize,
    pub(crate) padded_tables: usize,
}

impl MergedTable {
    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of tables whose rows ended up in this table.
    pub fn source_tables(&self) -> usize {
        self.source_tables
    }

    /// Number of tables that lacked some columns and had them filled with
    /// nulls.
    pub fn padded_tables(&self) -> usize {
        self.padded_tables
    }
}
