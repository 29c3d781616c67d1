use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::json::reader::infer_json_schema_from_iterator;
use arrow::json::writer::{JsonArray, WriterBuilder};
use arrow::json::ReaderBuilder;
use arrow::record_batch::RecordBatch;
use serde_json::Value;

use crate::args::ArgMap;
use crate::bail_adapter;
use crate::error::AdapterResult;

/// Serializes a batch as a JSON array of row objects, writing nulls explicitly.
pub fn to_records_json(batch: &RecordBatch) -> AdapterResult<String> {
    if batch.num_rows() == 0 {
        return Ok("[]".to_string());
    }

    let mut writer = WriterBuilder::new()
        .with_explicit_nulls(true)
        .build::<_, JsonArray>(Vec::new());
    writer.write(batch)?;
    writer.finish()?;

    let buffer = writer.into_inner();
    Ok(String::from_utf8(buffer).map_err(|e| ArrowError::JsonError(e.to_string()))?)
}

/// Builds a batch from row objects, inferring column types from the values.
///
/// A column mixing numbers, booleans and strings is read as strings.
pub fn from_records(rows: &[Value]) -> AdapterResult<RecordBatch> {
    let schema = Arc::new(infer_json_schema_from_iterator(
        rows.iter().map(Ok::<_, ArrowError>),
    )?);

    let mut decoder = ReaderBuilder::new(schema.clone())
        .with_batch_size(rows.len().max(1))
        .with_coerce_primitive(true)
        .build_decoder()?;
    decoder.serialize(rows)?;

    match decoder.flush()? {
        Some(batch) => Ok(batch),
        None => Ok(RecordBatch::new_empty(schema)),
    }
}

/// Builds a batch from a column-oriented object such as `{"prediction": [1, 2]}`.
///
/// Array values are columns and object values are index to value maps taken in
/// order. Scalars are repeated to the length of the other columns, or form a
/// single row when every value is a scalar.
pub fn from_columns(columns: &ArgMap) -> AdapterResult<RecordBatch> {
    let mut len: Option<usize> = None;
    for (name, value) in columns {
        let column_len = match value {
            Value::Array(values) => values.len(),
            Value::Object(values) => values.len(),
            _ => continue,
        };
        match len {
            Some(expected) if expected != column_len => bail_adapter!(
                Decode,
                "column '{}' has {} values but other columns have {}",
                name,
                column_len,
                expected
            ),
            _ => len = Some(column_len),
        }
    }
    let len = len.unwrap_or(1);

    if len == 0 {
        let fields: Vec<Field> = columns
            .keys()
            .map(|name| Field::new(name, DataType::Null, true))
            .collect();
        return Ok(RecordBatch::new_empty(Arc::new(Schema::new(fields))));
    }

    let cells: Vec<(&String, Vec<Value>)> = columns
        .iter()
        .map(|(name, value)| {
            let values = match value {
                Value::Array(values) => values.clone(),
                Value::Object(values) => values.values().cloned().collect(),
                scalar => vec![scalar.clone(); len],
            };
            (name, values)
        })
        .collect();

    let rows: Vec<Value> = (0..len)
        .map(|row| {
            Value::Object(
                cells
                    .iter()
                    .map(|(name, values)| ((*name).clone(), values[row].clone()))
                    .collect(),
            )
        })
        .collect();

    from_records(&rows)
}
