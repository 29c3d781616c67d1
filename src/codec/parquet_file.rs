use arrow::compute::concat_batches;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use parquet::file::reader::ChunkReader;

use crate::error::AdapterResult;

/// Writes a batch into an in-memory parquet file with snappy compression.
///
/// `metadata` entries end up in the file footer as key/value metadata.
pub fn write_parquet(batch: &RecordBatch, metadata: &[(&str, String)]) -> AdapterResult<Vec<u8>> {
    let key_values: Vec<KeyValue> = metadata
        .iter()
        .map(|(key, value)| KeyValue::new(key.to_string(), value.clone()))
        .collect();
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_key_value_metadata((!key_values.is_empty()).then_some(key_values))
        .build();

    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;

    Ok(buffer)
}

/// Reads a whole parquet file and concatenates its row groups into one batch.
pub fn read_parquet<R: ChunkReader + 'static>(reader: R) -> AdapterResult<RecordBatch> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(reader)?;
    let schema = builder.schema().clone();
    let batches = builder
        .build()?
        .collect::<Result<Vec<RecordBatch>, ArrowError>>()?;

    Ok(concat_batches(&schema, &batches)?)
}
