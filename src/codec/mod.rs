//! Conversions between Arrow record batches and the two wire encodings.

pub mod frame;
pub mod parquet_file;
pub mod records;

pub use frame::{has_column, rename_column, single_row};
pub use parquet_file::{read_parquet, write_parquet};
pub use records::{from_columns, from_records, to_records_json};
