use serde::Serialize;
use serde_json::Value;

use crate::args::ArgMap;
use crate::bail_adapter;
use crate::error::AdapterResult;

/// JSON body sent to the training endpoint.
#[derive(Serialize, Debug)]
pub struct TrainRequest<'a> {
    /// The dataset as a JSON records string
    pub df: String,
    pub target: &'a str,
    pub args: &'a ArgMap,
}

const STATUS_OK: &str = "ok";

/// Accepts only a JSON body whose `status` is exactly `"ok"`.
pub fn check_train_response(body: &str) -> AdapterResult<()> {
    let response: Value = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(_) => bail_adapter!(Decode, body),
    };

    match response.get("status") {
        Some(Value::String(status)) if status == STATUS_OK => Ok(()),
        Some(Value::String(status)) => bail_adapter!(Remote, status.as_str()),
        Some(status) => bail_adapter!(Remote, status.to_string()),
        None => bail_adapter!(Remote, response.to_string()),
    }
}
