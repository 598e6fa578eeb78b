//! Probe that fabricates results with random latency and random failures.
//! Useful for exercising the orchestrator without touching the network.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

use super::{ProbeFailure, ProbeResult, VerificationCapability};

const FAILURE_REASONS: &[&str] = &[
    "no such host",
    "has timed out",
    "i/o timeout",
    "temporarily unavailable",
    "catastrophic damage",
];

#[derive(Debug, Clone)]
pub struct SimulatedProbe {
    pub min_latency: Duration,
    pub max_latency: Duration,
    /// Probability in `[0, 1]` that a call fails with a random reason.
    pub failure_rate: f64,
}

impl Default for SimulatedProbe {
    fn default() -> Self {
        Self {
            min_latency: Duration::from_millis(100),
            max_latency: Duration::from_millis(1000),
            failure_rate: 0.5,
        }
    }
}

#[async_trait]
impl VerificationCapability for SimulatedProbe {
    async fn verify(
        &self,
        address: &str,
        _proxy: Option<&str>,
    ) -> std::result::Result<Option<ProbeResult>, ProbeFailure> {
        let (latency, failure) = {
            let mut rng = rand::thread_rng();
            let latency = if self.min_latency >= self.max_latency {
                self.min_latency
            } else {
                rng.gen_range(self.min_latency..=self.max_latency)
            };
            let failure = rng
                .gen_bool(self.failure_rate.clamp(0.0, 1.0))
                .then(|| FAILURE_REASONS[rng.gen_range(0..FAILURE_REASONS.len())]);
            (latency, failure)
        };

        sleep(latency).await;

        match failure {
            Some(reason) => Err(ProbeFailure::new(reason)),
            None => {
                tracing::trace!(target: "probe", "[{}] simulated success", address);
                Ok(Some(ProbeResult::deliverable(true)))
            }
        }
    }
}
