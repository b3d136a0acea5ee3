use std::collections::HashSet;

use arrow::{
    array::{new_null_array, ArrayRef},
    datatypes::{DataType, SchemaRef},
    record_batch::RecordBatch,
};

use crate::{
    error::{IngestError, IngestResult},
    table::{text_schema, MergedTable, RawTable},
};

/// Concatenates the tables of one dataset.
///
/// Tables are taken in object key order, so the result does not depend on
/// the order in which fetches completed. Columns are matched by name: the
/// merged schema holds every column seen, in order of first appearance, and
/// a table lacking a column gets nulls for it. Column buffers are shared,
/// not copied.
pub fn merge(mut tables: Vec<RawTable>) -> IngestResult<MergedTable> {
    if tables.is_empty() {
        return Err(IngestError::EmptyMerge);
    }
    tables.sort_by(|a, b| a.source().cmp(&b.source()));

    let schema = union_schema(&tables);
    let mut merged = MergedTable {
        schema: schema.clone(),
        batches: Vec::new(),
        num_rows: 0,
        source_tables: 0,
        padded_tables: 0,
    };

    for table in tables {
        let missing: Vec<&str> = schema
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .filter(|name| table.schema().column_with_name(name).is_none())
            .collect();
        if !missing.is_empty() {
            tracing::warn!(
                "{} has no column {:?}, filling {} rows with nulls",
                source_name(&table),
                missing,
                table.num_rows()
            );
            merged.padded_tables += 1;
        }

        for batch in table.batches() {
            merged.num_rows += batch.num_rows();
            merged.batches.push(align(batch, &schema)?);
        }
        merged.source_tables += 1;
    }

    Ok(merged)
}

fn union_schema(tables: &[RawTable]) -> SchemaRef {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for table in tables {
        for field in table.schema().fields() {
            if seen.insert(field.name().clone()) {
                names.push(field.name().clone());
            }
        }
    }
    text_schema(&names)
}

fn align(batch: &RecordBatch, schema: &SchemaRef) -> IngestResult<RecordBatch> {
    let columns: Vec<ArrayRef> = schema
        .fields()
        .iter()
        .map(|field| match batch.column_by_name(field.name()) {
            Some(column) => column.clone(),
            None => new_null_array(&DataType::Utf8, batch.num_rows()),
        })
        .collect();
    Ok(RecordBatch::try_new(schema.clone(), columns)?)
}

fn source_name(table: &RawTable) -> String {
    table
        .source()
        .map(|location| location.to_string())
        .unwrap_or_else(|| "table".to_string())
}
