use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, FieldRef, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use crate::error::AdapterResult;

pub fn has_column(batch: &RecordBatch, name: &str) -> bool {
    batch.schema_ref().column_with_name(name).is_some()
}

/// Moves column `from` to the name `to`.
///
/// When a column called `to` already exists its values are replaced in place,
/// otherwise the renamed column is appended after the remaining columns.
pub fn rename_column(batch: &RecordBatch, from: &str, to: &str) -> AdapterResult<RecordBatch> {
    let schema = batch.schema();
    let index = schema.index_of(from)?;
    let moved_field: FieldRef = Arc::new(schema.field(index).clone().with_name(to));
    let moved_column = batch.column(index).clone();

    let mut fields: Vec<FieldRef> = Vec::with_capacity(schema.fields().len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(batch.num_columns());
    let mut replaced = false;
    for (position, (field, column)) in schema.fields().iter().zip(batch.columns()).enumerate() {
        if position == index {
            continue;
        }
        if field.name() == to && !replaced {
            fields.push(moved_field.clone());
            columns.push(moved_column.clone());
            replaced = true;
        } else {
            fields.push(field.clone());
            columns.push(column.clone());
        }
    }
    if !replaced {
        fields.push(moved_field);
        columns.push(moved_column);
    }

    let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
    Ok(RecordBatch::try_new_with_options(schema, columns, &options)?)
}

/// A one-row batch of string columns, in the given order.
pub fn single_row(columns: &[(&str, &str)]) -> AdapterResult<RecordBatch> {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, _)| Field::new(*name, DataType::Utf8, false))
        .collect();
    let arrays: Vec<ArrayRef> = columns
        .iter()
        .map(|(_, value)| Arc::new(StringArray::from(vec![*value])) as ArrayRef)
        .collect();

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}
