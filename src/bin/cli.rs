use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use clap::{Parser, Subcommand};
use clap_serde_derive::ClapSerde;
use serde_json::Value;
use tracing::error;

use ray_serve_adapter::args::USING_KEY;
use ray_serve_adapter::codec::{from_records, read_parquet};
use ray_serve_adapter::config::Config;
use ray_serve_adapter::telemetry::init_telemetry;
use ray_serve_adapter::{ArgMap, FileStorage, MlEngine, RayServeHandler};

const DEFAULT_CONFIG_FILE: &str = "RayServe.toml";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env, default_value = DEFAULT_CONFIG_FILE)]
    config_file: String,

    /// Configuration options
    #[command(flatten)]
    opt_config: <Config as ClapSerde>::Opt,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the `using` clause without contacting any endpoint
    Validate {
        /// Column the model predicts
        #[arg(long)]
        target: String,

        /// JSON object with train_url, predict_url and optional is_parquet
        #[arg(long, value_parser = parse_arg_map)]
        using: ArgMap,
    },
    /// Send a dataset to the training endpoint and store the connection arguments
    Train {
        /// Column the model predicts
        #[arg(long)]
        target: String,

        /// JSON records or .parquet file with the training data
        #[arg(long)]
        data: PathBuf,

        /// JSON object with train_url, predict_url and optional is_parquet
        #[arg(long, value_parser = parse_arg_map)]
        using: ArgMap,
    },
    /// Send a dataset to the prediction endpoint and print the predictions
    Predict {
        /// JSON records or .parquet file to predict on
        #[arg(long)]
        data: PathBuf,

        /// JSON object merged over the stored arguments, may hold predict_params and having
        #[arg(long, value_parser = parse_arg_map)]
        args: Option<ArgMap>,
    },
    /// Print the stored endpoints and target
    Describe,
}

macro_rules! exit_err {
    ($code:expr, $fmt:expr $(, $arg:expr)*) => {{
        error!($fmt $(, $arg)*);
        std::process::exit($code);
    }};
}

fn main() {
    let Args {
        config_file,
        opt_config,
        cmd,
    } = Args::parse();

    let config = match Config::from_toml(&config_file) {
        Ok(file_config) => Config::from(file_config).merge(opt_config),
        Err(_) if config_file == DEFAULT_CONFIG_FILE => Config::from(opt_config),
        Err(err) => {
            init_telemetry("info");
            exit_err!(
                1,
                "Failed to read configuration file {} with error: {}",
                config_file,
                err
            );
        }
    };
    init_telemetry(&config.log_filter);

    if let Err(err) = run(&config, cmd) {
        exit_err!(1, "{:#}", err);
    }
}

fn run(config: &Config, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Validate { target, using } => {
            RayServeHandler::<FileStorage>::create_validation(&target, &using_clause(using))?;
            println!("Arguments are valid");
        }
        Commands::Train {
            target,
            data,
            using,
        } => {
            let df = read_dataset(&data)?;
            handler(config)?.create(&target, &df, &using_clause(using))?;
            println!("Trained model for target '{target}'");
        }
        Commands::Predict { data, args } => {
            let df = read_dataset(&data)?;
            let predictions = handler(config)?.predict(&df, args.as_ref())?;
            println!("{}", pretty_format_batches(&[predictions])?);
        }
        Commands::Describe => {
            if let Some(summary) = handler(config)?.describe(None)? {
                println!("{}", pretty_format_batches(&[summary])?);
            }
        }
    }
    Ok(())
}

fn handler(config: &Config) -> Result<RayServeHandler<FileStorage>> {
    let storage = FileStorage::new(&config.storage_dir);
    Ok(RayServeHandler::with_config(storage, config.handler_config())?)
}

fn using_clause(using: ArgMap) -> ArgMap {
    let mut args = ArgMap::new();
    args.insert(USING_KEY.to_string(), Value::Object(using));
    args
}

fn parse_arg_map(raw: &str) -> Result<ArgMap, String> {
    match serde_json::from_str(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("expected a JSON object".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

fn read_dataset(path: &Path) -> Result<RecordBatch> {
    if path.extension().map_or(false, |ext| ext == "parquet") {
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        return Ok(read_parquet(file)?);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let rows: Vec<Value> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of records", path.display()))?;
    Ok(from_records(&rows)?)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use ray_serve_adapter::codec::write_parquet;

    use super::*;

    #[test]
    fn arg_map_must_be_a_json_object() {
        let map = parse_arg_map(r#"{"train_url": "http://localhost:8000/train"}"#).unwrap();
        assert_eq!(map["train_url"], "http://localhost:8000/train");

        assert_eq!(
            parse_arg_map(r#"["http://localhost:8000/train"]"#).unwrap_err(),
            "expected a JSON object"
        );
        assert_eq!(parse_arg_map(r#""http://x""#).unwrap_err(), "expected a JSON object");
        assert!(parse_arg_map("train_url=http://x").is_err());
    }

    #[test]
    fn using_clause_nests_arguments() {
        let using = parse_arg_map(r#"{"predict_url": "http://x/predict"}"#).unwrap();
        let args = using_clause(using);
        assert_eq!(Value::Object(args), json!({"using": {"predict_url": "http://x/predict"}}));
    }

    #[test]
    fn datasets_read_from_json_records_and_parquet() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("rentals.json");
        let records = r#"[{"sqft": 900, "location": "good"}, {"sqft": 450, "location": null}]"#;
        std::fs::write(&json_path, records).unwrap();
        let from_json = read_dataset(&json_path).unwrap();
        assert_eq!(from_json.num_rows(), 2);
        assert_eq!(from_json.schema().field(1).name(), "location");

        let parquet_path = dir.path().join("rentals.parquet");
        std::fs::write(&parquet_path, write_parquet(&from_json, &[]).unwrap()).unwrap();
        let from_parquet = read_dataset(&parquet_path).unwrap();
        assert_eq!(from_parquet.num_rows(), 2);
        assert_eq!(from_parquet.columns(), from_json.columns());
    }

    #[test]
    fn dataset_must_be_a_records_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rentals.json");
        std::fs::write(&path, r#"{"sqft": [900]}"#).unwrap();

        let err = read_dataset(&path).unwrap_err();
        assert!(err.to_string().contains("is not a JSON array of records"), "{err}");
        assert!(read_dataset(&dir.path().join("missing.parquet")).is_err());
    }
}
