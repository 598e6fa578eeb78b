//! Defines the core runtime `Config` struct, its defaults, and related utilities.
//! Submodules handle loading and validation.

pub(crate) mod file;
pub(crate) mod loading;
pub(crate) mod validation;

pub use file::ConfigFile;
pub use loading::load_config;
pub use validation::validate;

use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::core::error::AppError;

/// Which verification capability backs new jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// Syntax + MX/host lookups against real DNS.
    Dns,
    /// Random latency and random classified failures, no network.
    Simulated,
}

impl FromStr for ProbeKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dns" => Ok(ProbeKind::Dns),
            "simulated" => Ok(ProbeKind::Simulated),
            other => Err(AppError::Config(format!("Unknown probe kind '{}'", other))),
        }
    }
}

/// Runtime configuration settings used by the orchestrator and the server.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub log_level: String,

    pub address_dir: PathBuf,
    pub output_dir: PathBuf,

    pub probe: ProbeKind,
    /// Upper bound on concurrent verifications within a batch. `None` means
    /// one task per item.
    pub max_concurrency: Option<usize>,

    pub dns_timeout: Duration,
    pub dns_servers: Vec<String>,

    pub default_batch_size: usize,
    pub default_retry_count: usize,
    pub default_delay_ms: u64,

    pub loaded_config_path: Option<String>,
}

impl Config {
    fn build_default() -> Self {
        let dns_servers = vec![
            "8.8.8.8".to_string(),
            "8.8.4.4".to_string(),
            "1.1.1.1".to_string(),
            "1.0.0.1".to_string(),
        ];

        Config {
            bind_address: "0.0.0.0:8000".to_string(),
            log_level: "info".to_string(),
            address_dir: PathBuf::from("data/addresses"),
            output_dir: PathBuf::from("data/results"),
            probe: ProbeKind::Dns,
            max_concurrency: None,
            dns_timeout: Duration::from_secs(5),
            dns_servers,
            default_batch_size: 100,
            default_retry_count: 2,
            default_delay_ms: 1000,
            loaded_config_path: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::build_default()
    }
}
