//! Locates, parses and applies the TOML configuration file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::file::ConfigFile;
use super::{validation, Config};
use crate::core::error::{AppError, Result};

pub(crate) const DEFAULT_CONFIG_FILE: &str = "email-verify.toml";

/// Loads the configuration from `path`, or from `email-verify.toml` in the
/// working directory when no path is given. A missing default file yields the
/// built-in defaults; a missing explicit file is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let (candidate, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };

    let mut config = Config::default();

    if candidate.is_file() {
        tracing::debug!("Loading configuration from {}", candidate.display());
        let raw = fs::read_to_string(&candidate)?;
        let file: ConfigFile = toml::from_str(&raw)?;
        apply_file(&mut config, file);
        config.loaded_config_path = Some(candidate.display().to_string());
    } else if explicit {
        return Err(AppError::Config(format!(
            "Configuration file '{}' not found",
            candidate.display()
        )));
    } else {
        tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
    }

    validation::validate(&config)?;
    Ok(config)
}

pub(crate) fn apply_file(config: &mut Config, file: ConfigFile) {
    if let Some(v) = file.server.bind_address {
        config.bind_address = v;
    }
    if let Some(v) = file.server.log_level {
        config.log_level = v;
    }
    if let Some(v) = file.storage.address_dir {
        config.address_dir = PathBuf::from(v);
    }
    if let Some(v) = file.storage.output_dir {
        config.output_dir = PathBuf::from(v);
    }
    if let Some(v) = file.verification.probe {
        config.probe = v;
    }
    if let Some(v) = file.verification.max_concurrency {
        config.max_concurrency = (v > 0).then_some(v);
    }
    if let Some(v) = file.dns.dns_timeout {
        config.dns_timeout = Duration::from_secs(v);
    }
    if let Some(v) = file.dns.dns_servers {
        config.dns_servers = v;
    }
    if let Some(v) = file.defaults.batch_size {
        config.default_batch_size = v;
    }
    if let Some(v) = file.defaults.retry_count {
        config.default_retry_count = v;
    }
    if let Some(v) = file.defaults.delay_ms {
        config.default_delay_ms = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ProbeKind;
    use std::io::Write;

    #[test]
    fn file_values_override_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(
            tmp,
            r#"
[server]
bind_address = "127.0.0.1:9000"

[verification]
probe = "simulated"
max_concurrency = 16

[defaults]
batch_size = 50
delay_ms = 0
"#
        )
        .unwrap();

        let config = load_config(Some(tmp.path())).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.probe, ProbeKind::Simulated);
        assert_eq!(config.max_concurrency, Some(16));
        assert_eq!(config.default_batch_size, 50);
        assert_eq!(config.default_delay_ms, 0);
        assert_eq!(config.default_retry_count, 2);
        assert!(config.loaded_config_path.is_some());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, "[server]\nport = 8000\n").unwrap();
        assert!(matches!(
            load_config(Some(tmp.path())),
            Err(AppError::Toml(_))
        ));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            load_config(Some(&missing)),
            Err(AppError::Config(_))
        ));
    }
}
