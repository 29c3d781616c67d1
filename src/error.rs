use std::fmt::Display;

use thiserror::Error;

/// The remote endpoint a request was aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Train,
    Predict,
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Train => write!(f, "training"),
            Endpoint::Predict => write!(f, "prediction"),
        }
    }
}

/// Every failure the adapter surfaces to its host.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Missing or malformed connection arguments, raised before any request is made.
    #[error("Error: {0}")]
    Config(String),

    #[error("Error: The URL provided for the {0} endpoint is invalid.")]
    InvalidUrl(Endpoint),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote service answered, but reported a failure. Carries its payload verbatim.
    #[error("Error: {0}")]
    Remote(String),

    #[error("Error: {0}")]
    Decode(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AdapterError {
    /// The payload without the `Error: ` prefix, for remote and decode failures.
    pub fn payload(&self) -> Option<&str> {
        match self {
            AdapterError::Remote(payload) | AdapterError::Decode(payload) => Some(payload),
            _ => None,
        }
    }
}

pub type AdapterResult<T, E = AdapterError> = Result<T, E>;

#[macro_export]
macro_rules! bail_adapter {
    ($variant:ident, $message:expr) => {
        return Err($crate::error::AdapterError::$variant($message.into()))
    };
    ($variant:ident, $fmt:expr $(, $arg:expr)+) => {
        return Err($crate::error::AdapterError::$variant(format!($fmt $(, $arg)+)))
    };
}
