//! The Ray Serve engine: ships datasets to remote train/predict endpoints.

use std::time::Duration;

use anyhow::anyhow;
use arrow::record_batch::RecordBatch;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::args::{
    is_present, merge_args, sub_map, ArgMap, ConnectionArgs, TransportFormat, HAVING_KEY,
    PREDICT_PARAMS_KEY, USING_KEY,
};
use crate::bail_adapter;
use crate::codec::{single_row, to_records_json, write_parquet};
use crate::engine::MlEngine;
use crate::error::{AdapterError, AdapterResult, Endpoint};
use crate::storage::ModelStorage;

use self::task::predict::{decode_json_prediction, decode_parquet_prediction, PredictRequest};
use self::task::train::{check_train_response, TrainRequest};

pub mod task;

pub use self::task::predict::PREDICTION_COLUMN;

/// Storage key holding the connection arguments.
pub const ARGS_KEY: &str = "args";

const PANDAS_RECORDS_CONTENT_TYPE: &str = "application/json; format=pandas-records";
const OCTET_STREAM: &str = "application/octet-stream";
const PRED_ARGS_KEY: &str = "pred_args";

#[derive(Debug, Clone, Default)]
pub struct HandlerConfig {
    /// Per-request timeout. `None` waits for the remote endpoint indefinitely.
    pub request_timeout: Option<Duration>,
}

pub struct RayServeHandler<S> {
    storage: S,
    client: Client,
}

impl<S: ModelStorage> RayServeHandler<S> {
    pub fn new(storage: S) -> AdapterResult<Self> {
        Self::with_config(storage, HandlerConfig::default())
    }

    pub fn with_config(storage: S, config: HandlerConfig) -> AdapterResult<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { storage, client })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn persisted_args(&self) -> AdapterResult<ArgMap> {
        match self.storage.json_get(ARGS_KEY)? {
            Some(Value::Object(args)) => Ok(args),
            Some(other) => Err(anyhow!("Stored connection arguments are not a mapping: {other}").into()),
            None => Err(anyhow!("No connection arguments stored, the model has not been created").into()),
        }
    }

    fn post_json<T: Serialize>(&self, url: Url, body: &T) -> AdapterResult<Response> {
        let body = serde_json::to_vec(body)?;
        debug!(%url, bytes = body.len(), "Posting pandas-records payload");
        Ok(self
            .client
            .post(url)
            .header(CONTENT_TYPE, PANDAS_RECORDS_CONTENT_TYPE)
            .body(body)
            .send()?)
    }

    fn post_form(&self, url: Url, form: Form) -> AdapterResult<Response> {
        debug!(%url, "Posting multipart parquet payload");
        Ok(self.client.post(url).multipart(form).send()?)
    }
}

/// Checks the `using` clause for both endpoint URLs.
pub fn check_using_clause(args: &ArgMap) -> AdapterResult<()> {
    let using = match args.get(USING_KEY) {
        Some(Value::Object(using)) if !using.is_empty() => using,
        _ => bail_adapter!(
            Config,
            "This engine requires some parameters via the 'using' clause. Please refer to the documentation of the Ray Serve handler and try again."
        ),
    };
    if !is_present(using.get("train_url")) {
        bail_adapter!(Config, "Please provide a URL for the training endpoint.");
    }
    if !is_present(using.get("predict_url")) {
        bail_adapter!(Config, "Please provide a URL for the prediction endpoint.");
    }
    Ok(())
}

fn endpoint_url(raw: &str, endpoint: Endpoint) -> AdapterResult<Url> {
    let url = Url::parse(raw).map_err(|_| AdapterError::InvalidUrl(endpoint))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(AdapterError::InvalidUrl(endpoint)),
    }
}

fn parquet_part(df: &RecordBatch, metadata: &[(&str, String)]) -> AdapterResult<Part> {
    let buffer = write_parquet(df, metadata)?;
    Ok(Part::bytes(buffer).file_name("df").mime_str(OCTET_STREAM)?)
}

impl<S: ModelStorage> MlEngine for RayServeHandler<S> {
    const NAME: &'static str = "ray_serve";

    fn create_validation(_target: &str, args: &ArgMap) -> AdapterResult<()> {
        check_using_clause(args)
    }

    #[tracing::instrument(level = "info", skip(self, df, args), fields(rows = df.num_rows()))]
    fn create(&self, target: &str, df: &RecordBatch, args: &ArgMap) -> AdapterResult<()> {
        check_using_clause(args)?;

        let mut using = sub_map(args, USING_KEY);
        using.insert("target".to_string(), Value::String(target.to_string()));
        let connection = ConnectionArgs::from_map(using)?;
        let using = connection.to_map()?;
        self.storage.json_set(ARGS_KEY, &Value::Object(using.clone()))?;

        let url = endpoint_url(&connection.train_url, Endpoint::Train)?;
        let response = match connection.transport() {
            TransportFormat::Parquet => {
                let form = Form::new()
                    .part("df", parquet_part(df, &[])?)
                    .text("args", serde_json::to_string(&using)?)
                    .text("target", target.to_string());
                self.post_form(url, form)?
            }
            TransportFormat::Json => {
                let request = TrainRequest {
                    df: to_records_json(df)?,
                    target,
                    args: &using,
                };
                self.post_json(url, &request)?
            }
        };

        let status = response.status();
        let body = response.text()?;
        if let Err(e) = check_train_response(&body) {
            warn!(%status, body = %body, "Training endpoint reported a failure");
            return Err(e);
        }

        info!(%status, "Training request accepted");
        Ok(())
    }

    #[tracing::instrument(level = "info", skip(self, df, args), fields(rows = df.num_rows()))]
    fn predict(&self, df: &RecordBatch, args: Option<&ArgMap>) -> AdapterResult<RecordBatch> {
        let persisted = self.persisted_args()?;
        let target = ConnectionArgs::from_map(persisted.clone())?.target;

        let no_args = ArgMap::new();
        let call = args.unwrap_or(&no_args);
        let having = sub_map(call, HAVING_KEY);
        let merged = merge_args(&persisted, [call, &sub_map(call, PREDICT_PARAMS_KEY), &having]);
        let pred_args = merge_args(&ArgMap::new(), [&sub_map(&merged, PREDICT_PARAMS_KEY), &having]);
        debug!(?merged, ?pred_args, "Merged prediction arguments");

        let connection = ConnectionArgs::from_map(merged)?;
        let url = endpoint_url(&connection.predict_url, Endpoint::Predict)?;
        let transport = connection.transport();

        let response = match transport {
            TransportFormat::Parquet => {
                let pred_args_json = serde_json::to_string(&pred_args)?;
                let form = Form::new()
                    .part("df", parquet_part(df, &[(PRED_ARGS_KEY, pred_args_json.clone())])?)
                    .text(PRED_ARGS_KEY, pred_args_json);
                self.post_form(url, form)?
            }
            TransportFormat::Json => {
                let request = PredictRequest {
                    df: to_records_json(df)?,
                    pred_args: &pred_args,
                };
                self.post_json(url, &request)?
            }
        };

        let status = response.status();
        let prediction = match transport {
            TransportFormat::Parquet => decode_parquet_prediction(response.bytes()?, &target),
            TransportFormat::Json => decode_json_prediction(&response.text()?, &target),
        };

        match prediction {
            Ok(frame) => {
                info!(%status, rows = frame.num_rows(), "Received predictions");
                Ok(frame)
            }
            Err(e) => {
                warn!(%status, error = %e, "Prediction endpoint did not return predictions");
                Err(e)
            }
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn describe(&self, _key: Option<&str>) -> AdapterResult<Option<RecordBatch>> {
        let args = ConnectionArgs::from_map(self.persisted_args()?)?;
        let summary = single_row(&[
            ("TRAIN_URL", args.train_url.as_str()),
            ("PREDICT_URL", args.predict_url.as_str()),
            ("TARGET", args.target.as_str()),
        ])?;
        Ok(Some(summary))
    }
}
