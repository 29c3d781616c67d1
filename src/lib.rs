//! Delegates model training and inference to a remote Ray Serve deployment.
//!
//! [`RayServeHandler`] implements the host lifecycle in [`MlEngine`]: it
//! persists the connection arguments through a [`ModelStorage`], posts
//! datasets to the configured endpoints as JSON records or parquet, and turns
//! the responses back into Arrow record batches.

pub mod args;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod handler;
pub mod storage;
pub mod telemetry;

pub use args::{merge_args, ArgMap, ConnectionArgs, TransportFormat};
pub use engine::MlEngine;
pub use error::{AdapterError, AdapterResult, Endpoint};
pub use handler::{HandlerConfig, RayServeHandler, ARGS_KEY, PREDICTION_COLUMN};
pub use storage::{FileStorage, MemoryStorage, ModelStorage};
