use arrow::record_batch::RecordBatch;
use parquet::file::reader::ChunkReader;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::args::ArgMap;
use crate::codec::{from_columns, has_column, read_parquet, rename_column, to_records_json};
use crate::error::{AdapterError, AdapterResult};

/// Column the remote endpoint writes its predictions to.
pub const PREDICTION_COLUMN: &str = "prediction";

pub const PARQUET_DECODE_ERROR: &str = "Could not decode parquet.";

/// JSON body sent to the prediction endpoint.
#[derive(Serialize, Debug)]
pub struct PredictRequest<'a> {
    /// The dataset as a JSON records string
    pub df: String,
    pub pred_args: &'a ArgMap,
}

/// Decodes a column-oriented JSON prediction response.
pub fn decode_json_prediction(body: &str, target: &str) -> AdapterResult<RecordBatch> {
    let response: Value =
        serde_json::from_str(body).map_err(|_| AdapterError::Decode(body.to_string()))?;

    match response {
        Value::Object(columns) if columns.contains_key(PREDICTION_COLUMN) => {
            let frame = from_columns(&columns).map_err(|e| match e {
                AdapterError::Decode(_) => e,
                other => AdapterError::Decode(format!("Could not decode prediction: {other}")),
            })?;
            with_target_name(frame, target)
        }
        other => Err(AdapterError::Remote(other.to_string())),
    }
}

/// Decodes a parquet prediction response.
pub fn decode_parquet_prediction<R: ChunkReader + 'static>(
    body: R,
    target: &str,
) -> AdapterResult<RecordBatch> {
    let frame = read_parquet(body).map_err(|e| {
        warn!(error = %e, "Prediction response is not a parquet file");
        AdapterError::Decode(PARQUET_DECODE_ERROR.to_string())
    })?;

    if has_column(&frame, PREDICTION_COLUMN) {
        with_target_name(frame, target)
    } else {
        Err(AdapterError::Remote(to_records_json(&frame)?))
    }
}

fn with_target_name(frame: RecordBatch, target: &str) -> AdapterResult<RecordBatch> {
    if target == PREDICTION_COLUMN {
        return Ok(frame);
    }
    rename_column(&frame, PREDICTION_COLUMN, target)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    use super::*;
    use crate::codec::write_parquet;

    #[test]
    fn json_prediction_is_renamed_to_target() {
        let frame = decode_json_prediction(r#"{"prediction": [10, 20]}"#, "rental_price").unwrap();

        assert_eq!(frame.num_columns(), 1);
        let column = frame
            .column_by_name("rental_price")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(&column.values()[..], &[10, 20]);
    }

    #[test]
    fn mixed_type_predictions_are_accepted() {
        let frame = decode_json_prediction(r#"{"prediction": [1, "a"]}"#, "y").unwrap();

        let column = frame
            .column_by_name("y")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(column.value(0), "1");
        assert_eq!(column.value(1), "a");
    }

    #[test]
    fn target_named_prediction_is_left_alone() {
        let frame = decode_json_prediction(r#"{"prediction": [1.5]}"#, "prediction").unwrap();
        assert_eq!(frame.num_columns(), 1);
        assert_eq!(frame.schema().field(0).name(), "prediction");
    }

    #[test]
    fn missing_prediction_echoes_body() {
        let err = decode_json_prediction(r#"{"detail": "timeout"}"#, "y").unwrap_err();
        assert!(matches!(err, AdapterError::Remote(_)));
        assert_eq!(err.payload(), Some(r#"{"detail":"timeout"}"#));
    }

    #[test]
    fn non_object_json_is_remote_error() {
        let err = decode_json_prediction(r#"["prediction"]"#, "y").unwrap_err();
        assert_eq!(err.payload(), Some(r#"["prediction"]"#));
    }

    #[test]
    fn non_json_text_is_the_payload() {
        let err = decode_json_prediction("Internal Server Error", "y").unwrap_err();
        assert!(err.to_string().contains("Internal Server Error"));
    }

    fn parquet_with(name: &str) -> Vec<u8> {
        let schema = Arc::new(Schema::new(vec![Field::new(name, DataType::Float64, false)]));
        let column: ArrayRef = Arc::new(Float64Array::from(vec![0.25, 0.75]));
        let batch = RecordBatch::try_new(schema, vec![column]).unwrap();
        write_parquet(&batch, &[]).unwrap()
    }

    #[test]
    fn parquet_prediction_is_renamed() {
        let body = ::bytes::Bytes::from(parquet_with(PREDICTION_COLUMN));
        let frame = decode_parquet_prediction(body, "churn").unwrap();
        assert!(frame.column_by_name("churn").is_some());
        assert!(frame.column_by_name(PREDICTION_COLUMN).is_none());
    }

    #[test]
    fn parquet_without_prediction_echoes_table() {
        let body = ::bytes::Bytes::from(parquet_with("error"));
        let err = decode_parquet_prediction(body, "churn").unwrap_err();
        assert_eq!(err.payload(), Some(r#"[{"error":0.25},{"error":0.75}]"#));
    }

    #[test]
    fn unreadable_parquet_is_generic_decode_error() {
        let body = ::bytes::Bytes::from_static(b"<html>502 Bad Gateway</html>");
        let err = decode_parquet_prediction(body, "churn").unwrap_err();
        assert_eq!(err.to_string(), "Error: Could not decode parquet.");
    }
}
