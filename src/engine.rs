use arrow::record_batch::RecordBatch;

use crate::args::ArgMap;
use crate::error::AdapterResult;

/// Lifecycle hooks a host calls on an ML engine.
///
/// The host runs `create_validation` before anything else, then `create`
/// once to train, then `predict` and `describe` any number of times.
pub trait MlEngine {
    /// Name the host registers the engine under.
    const NAME: &'static str;

    /// Checks the creation arguments without performing any I/O.
    fn create_validation(target: &str, args: &ArgMap) -> AdapterResult<()>;

    /// Trains a model on `df` to predict the `target` column.
    ///
    /// On success the engine has persisted whatever later calls need.
    fn create(&self, target: &str, df: &RecordBatch, args: &ArgMap) -> AdapterResult<()>;

    /// Predicts on `df`. Requires a prior successful `create`.
    fn predict(&self, df: &RecordBatch, args: Option<&ArgMap>) -> AdapterResult<RecordBatch>;

    /// Summarizes the trained model. Engines without a summary return `None`.
    fn describe(&self, _key: Option<&str>) -> AdapterResult<Option<RecordBatch>> {
        Ok(None)
    }
}
