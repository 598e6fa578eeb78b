//! Batch verification orchestrator: job state machine, batch scheduler,
//! concurrent verification fan-out, retry rounds, proxy rotation and
//! progress reporting.

pub mod progress;
pub mod proxy;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub(crate) mod unit;
pub mod verifier;

pub use progress::{Outcome, ProgressUnit, Reporter};
pub use proxy::ProxyRotator;
pub use registry::{JobRegistry, RunGuard};
pub use scheduler::plan_batches;
pub use verifier::{JobSettings, Verifier};

use std::sync::Arc;

use crate::core::config::Config;
use crate::core::error::Result;
use crate::storage::{AddressSource, BulkSink, CsvFileSink, FileAddressSource};
use crate::verification::{build_capability, VerificationCapability};

/// External collaborators a job talks to.
#[derive(Clone)]
pub struct Backends {
    pub capability: Arc<dyn VerificationCapability>,
    pub source: Arc<dyn AddressSource>,
    pub sink: Arc<dyn BulkSink>,
    pub max_concurrency: Option<usize>,
}

impl Backends {
    pub fn new(
        capability: Arc<dyn VerificationCapability>,
        source: Arc<dyn AddressSource>,
        sink: Arc<dyn BulkSink>,
    ) -> Self {
        Self {
            capability,
            source,
            sink,
            max_concurrency: None,
        }
    }

    pub fn with_max_concurrency(mut self, max: Option<usize>) -> Self {
        self.max_concurrency = max.filter(|m| *m > 0);
        self
    }

    /// File-backed storage and the configured probe.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            build_capability(config)?,
            Arc::new(FileAddressSource::new(&config.address_dir)),
            Arc::new(CsvFileSink::new(&config.output_dir)),
        )
        .with_max_concurrency(config.max_concurrency))
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}
