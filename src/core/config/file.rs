//! Defines the structure mirroring the TOML configuration file format.

use serde::Deserialize;

use super::ProbeKind;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub(crate) server: ServerConfig,
    #[serde(default)]
    pub(crate) storage: StorageConfig,
    #[serde(default)]
    pub(crate) verification: VerificationConfig,
    #[serde(default)]
    pub(crate) dns: DnsConfig,
    #[serde(default)]
    pub(crate) defaults: JobDefaultsConfig,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct ServerConfig {
    pub(crate) bind_address: Option<String>,
    pub(crate) log_level: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct StorageConfig {
    pub(crate) address_dir: Option<String>,
    pub(crate) output_dir: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct VerificationConfig {
    pub(crate) probe: Option<ProbeKind>,
    pub(crate) max_concurrency: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct DnsConfig {
    pub(crate) dns_timeout: Option<u64>,
    pub(crate) dns_servers: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct JobDefaultsConfig {
    pub(crate) batch_size: Option<usize>,
    pub(crate) retry_count: Option<usize>,
    pub(crate) delay_ms: Option<u64>,
}
