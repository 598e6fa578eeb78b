#![allow(dead_code)]

use async_trait::async_trait;
use email_verify_core::orchestrator::{Backends, JobSettings, Verifier};
use email_verify_core::storage::{MemorySink, MemorySource};
use email_verify_core::verification::{ProbeFailure, ProbeResult, VerificationCapability};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

type Script =
    dyn Fn(&str, usize) -> Result<Option<ProbeResult>, ProbeFailure> + Send + Sync + 'static;

/// Probe whose answer is computed from the address and how many times that
/// address has been probed before. Records every call.
pub struct ScriptedProbe {
    script: Box<Script>,
    calls: Mutex<Vec<(String, Option<String>)>>,
    latency: Duration,
}

impl ScriptedProbe {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&str, usize) -> Result<Option<ProbeResult>, ProbeFailure> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    /// Makes every call take `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn always_ok() -> Self {
        Self::new(|_, _| Ok(Some(ProbeResult::deliverable(false))))
    }

    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().clone()
    }

    pub fn attempts_for(&self, address: &str) -> usize {
        self.calls.lock().iter().filter(|(a, _)| a == address).count()
    }
}

#[async_trait]
impl VerificationCapability for ScriptedProbe {
    async fn verify(
        &self,
        address: &str,
        proxy: Option<&str>,
    ) -> Result<Option<ProbeResult>, ProbeFailure> {
        let attempt = {
            let mut calls = self.calls.lock();
            let attempt = calls.iter().filter(|(a, _)| a == address).count();
            calls.push((address.to_string(), proxy.map(str::to_string)));
            attempt
        };
        if self.latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.latency).await;
        }
        (self.script)(address, attempt)
    }
}

pub fn addresses(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("user{}@example.com", i)).collect()
}

pub fn settings(email_count: usize, batch_size: usize, retry_count: usize, proxies: &[&str]) -> JobSettings {
    JobSettings {
        email_count,
        batch_size,
        retry_count,
        delay_ms: 0,
        proxies: proxies.iter().map(|p| p.to_string()).collect(),
    }
}

pub struct Harness {
    pub probe: Arc<ScriptedProbe>,
    pub source: Arc<MemorySource>,
    pub sink: Arc<MemorySink>,
}

impl Harness {
    pub fn new(probe: ScriptedProbe) -> Self {
        Self::with_sink(probe, MemorySink::new())
    }

    pub fn with_sink(probe: ScriptedProbe, sink: MemorySink) -> Self {
        Self {
            probe: Arc::new(probe),
            source: Arc::new(MemorySource::new()),
            sink: Arc::new(sink),
        }
    }

    pub fn backends(&self) -> Backends {
        Backends::new(self.probe.clone(), self.source.clone(), self.sink.clone())
    }

    pub fn verifier(&self, job_id: i64, addresses: Vec<String>, settings: JobSettings) -> Verifier {
        self.source.insert(job_id, addresses);
        Verifier::create(job_id, settings, self.backends()).unwrap()
    }
}
