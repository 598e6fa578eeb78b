//! Sanity checks applied after the configuration has been assembled.

use std::net::SocketAddr;

use super::Config;
use crate::core::error::{AppError, Result};

/// Rejects configurations the server cannot start with.
pub fn validate(config: &Config) -> Result<()> {
    config.bind_address.parse::<SocketAddr>().map_err(|e| {
        AppError::Config(format!(
            "Invalid bind address '{}': {}",
            config.bind_address, e
        ))
    })?;

    if config.default_batch_size == 0 {
        return Err(AppError::Config(
            "defaults.batch_size must be greater than zero".to_string(),
        ));
    }

    if config.dns_servers.is_empty() {
        return Err(AppError::Config(
            "dns.dns_servers must list at least one server".to_string(),
        ));
    }
    for server in &config.dns_servers {
        server.parse::<std::net::IpAddr>().map_err(|e| {
            AppError::Config(format!("Invalid DNS server '{}': {}", server, e))
        })?;
    }

    Ok(())
}
