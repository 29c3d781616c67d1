use std::time::Duration;

use anyhow::Result;
use clap_serde_derive::ClapSerde;

use crate::handler::HandlerConfig;

#[derive(ClapSerde, Debug)]
pub struct Config {
    /// Directory the connection arguments are persisted in
    #[default(".ray_serve".to_string())]
    #[arg(short, long, env = "RAY_SERVE_STORAGE_DIR")]
    pub storage_dir: String,

    /// Seconds to wait for a remote endpoint before giving up, 0 waits indefinitely
    #[default(0)]
    #[arg(short = 't', long, env = "RAY_SERVE_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: u64,

    /// Log filter used when RUST_LOG is not set
    #[default("info".to_string())]
    #[arg(short, long, env = "RAY_SERVE_LOG_FILTER")]
    pub log_filter: String,
}

impl Config {
    /// Reads the partial configuration stored in a TOML file.
    pub fn from_toml(path: &str) -> Result<<Self as ClapSerde>::Opt> {
        let str = std::fs::read_to_string(path)?;
        let config = toml::from_str(&str)?;
        Ok(config)
    }

    pub fn handler_config(&self) -> HandlerConfig {
        HandlerConfig {
            request_timeout: (self.request_timeout_secs > 0)
                .then(|| Duration::from_secs(self.request_timeout_secs)),
        }
    }
}
