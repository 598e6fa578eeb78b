//! The job state machine: one `Verifier` per verification run.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::progress::{ProgressUnit, Reporter};
use super::proxy::ProxyRotator;
use super::Backends;
use crate::channel::ChannelHandle;
use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::{CreateJobRequest, JobId, JobSnapshot, JobState, ProgressSnapshot};

/// Per-job knobs fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSettings {
    pub email_count: usize,
    pub batch_size: usize,
    pub retry_count: usize,
    pub delay_ms: u64,
    pub proxies: Vec<String>,
}

impl JobSettings {
    /// Builds settings from a `create-verifier` payload, filling omitted
    /// fields from the configured defaults.
    pub fn from_request(req: CreateJobRequest, config: &Config) -> Result<Self> {
        let settings = Self {
            email_count: req.email_count,
            batch_size: req.batch_size.unwrap_or(config.default_batch_size),
            retry_count: req.retry_count.unwrap_or(config.default_retry_count),
            delay_ms: req.delay_ms.unwrap_or(config.default_delay_ms),
            proxies: req
                .proxies
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(AppError::Config(
                "batchSize must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Mutable job bookkeeping, guarded as a whole.
#[derive(Debug)]
pub(super) struct JobProgress {
    pub(super) state: JobState,
    pub(super) current_batch_number: usize,
    pub(super) current_batch_size: usize,
    pub(super) rotator: ProxyRotator,
    pub(super) completed_batches: BTreeMap<usize, Vec<ProgressSnapshot>>,
    pub(super) created_at: DateTime<Utc>,
    pub(super) started_at: Option<DateTime<Utc>>,
    pub(super) finished_at: Option<DateTime<Utc>>,
}

pub struct Verifier {
    pub(super) job_id: JobId,
    pub(super) settings: JobSettings,
    pub(super) backends: Backends,
    pub(super) reporter: Reporter,
    pub(super) progress: Mutex<JobProgress>,
    /// Units of the batch in flight: index 0 is the main pass, then one per
    /// retry round.
    pub(super) current_units: RwLock<Vec<Arc<ProgressUnit>>>,
}

impl Verifier {
    /// Creates a job in the `created` state.
    pub fn create(job_id: JobId, settings: JobSettings, backends: Backends) -> Result<Self> {
        settings.validate()?;
        let rotator = ProxyRotator::new(settings.proxies.clone());
        Ok(Self {
            job_id,
            settings,
            backends,
            reporter: Reporter::default(),
            progress: Mutex::new(JobProgress {
                state: JobState::Created,
                current_batch_number: 0,
                current_batch_size: 0,
                rotator,
                completed_batches: BTreeMap::new(),
                created_at: Utc::now(),
                started_at: None,
                finished_at: None,
            }),
            current_units: RwLock::new(Vec::new()),
        })
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn settings(&self) -> &JobSettings {
        &self.settings
    }

    pub fn state(&self) -> JobState {
        self.progress.lock().state
    }

    /// Rebinds progress broadcasting to `handle`, e.g. after a reconnect.
    pub fn attach_channel(&self, handle: ChannelHandle) {
        self.reporter.attach(handle);
    }

    /// Events for whichever connection currently watches this job.
    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let p = self.progress.lock();
        let current_progress_list = self
            .current_units
            .read()
            .iter()
            .map(|u| u.snapshot())
            .collect();
        JobSnapshot {
            job_id: self.job_id,
            state: p.state,
            email_count: self.settings.email_count,
            batch_size: self.settings.batch_size,
            retry_count: self.settings.retry_count,
            delay_ms: self.settings.delay_ms,
            proxies: self.settings.proxies.clone(),
            cur_proxy_idx: p.rotator.index(),
            completed_batches: p.completed_batches.clone(),
            current_batch_number: p.current_batch_number,
            current_batch_size: p.current_batch_size,
            current_progress_list,
            created_at: p.created_at,
            started_at: p.started_at,
            finished_at: p.finished_at,
        }
    }

    /// Drives the job from `created` to `done`.
    ///
    /// Rejects with [`AppError::InvalidState`] unless the job is `created`;
    /// a rejected call has no side effects. A persistence failure aborts the
    /// run and leaves the job `running`.
    pub async fn run(&self) -> Result<()> {
        self.begin()?;
        tracing::info!(target: "scheduler", "[job {}] run started", self.job_id);

        let addresses = self.backends.source.load(self.job_id).await?;
        if addresses.len() != self.settings.email_count {
            tracing::warn!(
                target: "scheduler",
                "[job {}] expected {} addresses, source returned {}",
                self.job_id,
                self.settings.email_count,
                addresses.len()
            );
        }

        self.reporter.emit("get-verifier-details-res", &self.snapshot());
        self.run_batches(&addresses).await?;

        {
            let mut p = self.progress.lock();
            p.state = JobState::Done;
            p.finished_at = Some(Utc::now());
        }
        tracing::info!(target: "scheduler", "[job {}] run finished", self.job_id);
        self.reporter.emit("get-verifier-details-res", &self.snapshot());
        Ok(())
    }

    fn begin(&self) -> Result<()> {
        let mut p = self.progress.lock();
        if p.state != JobState::Created {
            return Err(AppError::InvalidState {
                job_id: self.job_id,
                state: p.state,
            });
        }
        p.state = JobState::Running;
        p.started_at = Some(Utc::now());
        Ok(())
    }
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("job_id", &self.job_id)
            .field("settings", &self.settings)
            .field("state", &self.state())
            .finish()
    }
}
