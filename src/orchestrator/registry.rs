//! Map from job id to its active verifier, shared by all connections.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::verifier::Verifier;
use crate::core::error::{AppError, Result};
use crate::core::models::{JobId, JobState};

#[derive(Debug, Default)]
struct Jobs {
    verifiers: HashMap<JobId, Arc<Verifier>>,
    /// Ids with a run task in flight, kept even after `remove`.
    running: HashSet<JobId>,
}

impl Jobs {
    fn is_running(&self, job_id: JobId) -> bool {
        self.running.contains(&job_id)
            || self
                .verifiers
                .get(&job_id)
                .is_some_and(|v| v.state() == JobState::Running)
    }
}

/// Cheap to clone; every clone refers to the same table.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<Jobs>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `verifier`, replacing any job previously registered under
    /// the same id.
    pub fn add(&self, job_id: JobId, verifier: Arc<Verifier>) -> Option<Arc<Verifier>> {
        self.jobs.write().verifiers.insert(job_id, verifier)
    }

    /// Like [`add`](Self::add), but refuses while a run for `job_id` is in
    /// flight, including one whose verifier was already removed. The check
    /// and the insert happen under one write lock.
    pub fn replace(&self, job_id: JobId, verifier: Arc<Verifier>) -> Result<Option<Arc<Verifier>>> {
        let mut jobs = self.jobs.write();
        if jobs.is_running(job_id) {
            return Err(AppError::InvalidState {
                job_id,
                state: JobState::Running,
            });
        }
        Ok(jobs.verifiers.insert(job_id, verifier))
    }

    pub fn remove(&self, job_id: JobId) -> Option<Arc<Verifier>> {
        self.jobs.write().verifiers.remove(&job_id)
    }

    pub fn get(&self, job_id: JobId) -> Option<Arc<Verifier>> {
        self.jobs.read().verifiers.get(&job_id).cloned()
    }

    /// Claims the single run slot for `job_id`. The slot is released when
    /// the returned guard drops.
    pub fn claim_run(&self, job_id: JobId) -> Result<(Arc<Verifier>, RunGuard)> {
        let mut jobs = self.jobs.write();
        let verifier = jobs
            .verifiers
            .get(&job_id)
            .cloned()
            .ok_or(AppError::JobNotFound(job_id))?;
        if !jobs.running.insert(job_id) {
            return Err(AppError::InvalidState {
                job_id,
                state: JobState::Running,
            });
        }
        let guard = RunGuard {
            registry: self.clone(),
            job_id,
        };
        Ok((verifier, guard))
    }

    pub fn len(&self) -> usize {
        self.jobs.read().verifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().verifiers.is_empty()
    }

    pub fn ids(&self) -> Vec<JobId> {
        let mut ids: Vec<_> = self.jobs.read().verifiers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// Holds a job's run slot; see [`JobRegistry::claim_run`].
#[derive(Debug)]
pub struct RunGuard {
    registry: JobRegistry,
    job_id: JobId,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.registry.jobs.write().running.remove(&self.job_id);
    }
}
