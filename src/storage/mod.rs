//! Storage collaborators of the orchestrator: where addresses come from and
//! where finished batches go.

pub mod csv_file;

pub use csv_file::{CsvFileSink, FileAddressSource};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;

use crate::core::error::{AppError, Result};
use crate::core::models::{JobId, ResultRow};

/// Commits one batch of result rows in a single all-or-nothing operation.
#[async_trait]
pub trait BulkSink: Send + Sync {
    async fn commit(&self, job_id: JobId, batch: usize, rows: &[ResultRow]) -> Result<()>;
}

/// Supplies the ordered address list a job verifies.
#[async_trait]
pub trait AddressSource: Send + Sync {
    async fn load(&self, job_id: JobId) -> Result<Vec<String>>;
}

/// A committed batch as recorded by [`MemorySink`].
#[derive(Debug, Clone)]
pub struct CommittedBatch {
    pub job_id: JobId,
    pub batch: usize,
    pub rows: Vec<ResultRow>,
}

/// Keeps committed batches in memory. Optionally fails a chosen batch index.
#[derive(Debug, Default)]
pub struct MemorySink {
    commits: Mutex<Vec<CommittedBatch>>,
    fail_on_batch: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(batch: usize) -> Self {
        Self {
            commits: Mutex::new(Vec::new()),
            fail_on_batch: Some(batch),
        }
    }

    pub fn commits(&self) -> Vec<CommittedBatch> {
        self.commits.lock().clone()
    }
}

#[async_trait]
impl BulkSink for MemorySink {
    async fn commit(&self, job_id: JobId, batch: usize, rows: &[ResultRow]) -> Result<()> {
        if self.fail_on_batch == Some(batch) {
            return Err(AppError::Io(io::Error::other(format!(
                "bulk load rejected batch {} of job {}",
                batch, job_id
            ))));
        }
        self.commits.lock().push(CommittedBatch {
            job_id,
            batch,
            rows: rows.to_vec(),
        });
        Ok(())
    }
}

/// Serves address lists registered up front.
#[derive(Debug, Default)]
pub struct MemorySource {
    lists: Mutex<HashMap<JobId, Vec<String>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job_id: JobId, addresses: Vec<String>) {
        self.lists.lock().insert(job_id, addresses);
    }
}

#[async_trait]
impl AddressSource for MemorySource {
    async fn load(&self, job_id: JobId) -> Result<Vec<String>> {
        self.lists
            .lock()
            .get(&job_id)
            .cloned()
            .ok_or(AppError::JobNotFound(job_id))
    }
}
