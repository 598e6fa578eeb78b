//! The verification capability the orchestrator calls for each address, plus
//! the probes shipped with the binary.

pub mod dns;
pub mod result;
pub mod simulated;

pub use result::{FailureClass, ProbeFailure, ProbeResult};

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::config::{Config, ProbeKind};
use crate::core::error::Result;

/// Checks whether a single address is reachable/deliverable.
///
/// `Ok(None)` means the probe produced neither a result nor an error; the
/// orchestrator records that as a host-not-found equivalent failure.
#[async_trait]
pub trait VerificationCapability: Send + Sync {
    async fn verify(
        &self,
        address: &str,
        proxy: Option<&str>,
    ) -> std::result::Result<Option<ProbeResult>, ProbeFailure>;
}

/// Builds the probe selected by `config.probe`.
pub fn build_capability(config: &Config) -> Result<Arc<dyn VerificationCapability>> {
    match config.probe {
        ProbeKind::Dns => {
            let probe = dns::DnsProbe::new(config)?;
            tracing::info!(
                "DNS probe initialized with {} name servers",
                config.dns_servers.len()
            );
            Ok(Arc::new(probe))
        }
        ProbeKind::Simulated => {
            tracing::warn!("Using simulated probe: results are random");
            Ok(Arc::new(simulated::SimulatedProbe::default()))
        }
    }
}
