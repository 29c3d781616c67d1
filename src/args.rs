use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bail_adapter;
use crate::error::{AdapterError, AdapterResult};

/// Insertion-ordered key/value arguments as handed over by the host.
pub type ArgMap = serde_json::Map<String, Value>;

pub const USING_KEY: &str = "using";
pub const PREDICT_PARAMS_KEY: &str = "predict_params";
pub const HAVING_KEY: &str = "having";

/// The arguments persisted at creation time and reused by every later call.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ConnectionArgs {
    /// Endpoint receiving the training dataset
    pub train_url: String,

    /// Endpoint receiving datasets to predict on
    pub predict_url: String,

    /// Name of the label column, injected at creation
    #[serde(default)]
    pub target: String,

    /// Everything else from the `using` clause, including `is_parquet`
    #[serde(flatten)]
    pub extra: ArgMap,
}

impl ConnectionArgs {
    /// Reads the typed fields. Wrongly typed URLs or target are a `Config` error.
    pub fn from_map(map: ArgMap) -> AdapterResult<Self> {
        serde_json::from_value(Value::Object(map))
            .map_err(|e| AdapterError::Config(format!("Invalid connection arguments: {e}")))
    }

    pub fn to_map(&self) -> AdapterResult<ArgMap> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => bail_adapter!(Config, "connection arguments serialized to {}", other),
        }
    }

    pub fn transport(&self) -> TransportFormat {
        TransportFormat::from_args(&self.extra)
    }
}

/// Wire encoding used for dataset payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportFormat {
    #[default]
    Json,
    Parquet,
}

impl TransportFormat {
    pub const FLAG_KEY: &'static str = "is_parquet";

    /// Reads the `is_parquet` flag. Anything unrecognised falls back to JSON.
    pub fn from_args(args: &ArgMap) -> Self {
        let parquet = match args.get(Self::FLAG_KEY) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(flag)) => {
                matches!(flag.to_lowercase().as_str(), "true" | "1" | "yes")
            }
            Some(Value::Number(flag)) => flag.as_f64().map_or(false, |n| n != 0.0),
            _ => false,
        };
        if parquet {
            TransportFormat::Parquet
        } else {
            TransportFormat::Json
        }
    }
}

/// Merges `overrides` onto `base` from left to right. Later sources win and
/// `null` values in an override never replace anything.
pub fn merge_args<'a>(base: &ArgMap, overrides: impl IntoIterator<Item = &'a ArgMap>) -> ArgMap {
    let mut merged = base.clone();
    for source in overrides {
        for (key, value) in source.iter().filter(|(_, value)| !value.is_null()) {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Returns the object stored under `key`, or an empty map when it is absent or not an object.
pub fn sub_map(args: &ArgMap, key: &str) -> ArgMap {
    match args.get(key) {
        Some(Value::Object(map)) => map.clone(),
        _ => ArgMap::new(),
    }
}

/// True when `value` is a string with content.
pub(crate) fn is_present(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::String(s)) if !s.is_empty())
}
