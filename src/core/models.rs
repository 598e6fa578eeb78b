//! Data structures shared between the orchestrator, the storage adapters and
//! the event protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a verification job (the uploaded file it verifies).
pub type JobId = i64;

/// Lifecycle of a verification job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    #[serde(rename = "not created")]
    NotCreated,
    #[serde(rename = "created")]
    Created,
    #[serde(rename = "running")]
    Running,
    #[serde(rename = "done")]
    Done,
}

impl JobState {
    /// The wire label used in `status` events and snapshots.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::NotCreated => "not created",
            JobState::Created => "created",
            JobState::Running => "running",
            JobState::Done => "done",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of one progress unit's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub progress: usize,
    pub success: usize,
    pub failed: usize,
    pub retry: usize,
}

/// One address's outcome within the batch currently executing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRow {
    pub job_id: JobId,
    pub email: String,
    pub is_valid_syntax: bool,
    /// "yes", "no", "unknown" or empty when the probe never got that far.
    pub reachable: String,
    pub is_deliverable: bool,
    pub is_host_exists: bool,
    pub has_mx_records: bool,
    pub is_disposable: bool,
    pub is_catch_all: bool,
    pub is_inbox_full: bool,
    pub error_msg: Option<String>,
}

impl ResultRow {
    pub fn new(job_id: JobId, email: impl Into<String>) -> Self {
        Self {
            job_id,
            email: email.into(),
            ..Default::default()
        }
    }
}

/// Full job view sent as `get-verifier-details-res`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub state: JobState,
    pub email_count: usize,
    pub batch_size: usize,
    pub retry_count: usize,
    pub delay_ms: u64,
    pub proxies: Vec<String>,
    /// -1 when no proxies are configured.
    pub cur_proxy_idx: i64,
    pub completed_batches: BTreeMap<usize, Vec<ProgressSnapshot>>,
    pub current_batch_number: usize,
    pub current_batch_size: usize,
    pub current_progress_list: Vec<ProgressSnapshot>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Payload of the `create-verifier` command. Omitted fields fall back to the
/// configured job defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub email_count: usize,
    pub batch_size: Option<usize>,
    pub retry_count: Option<usize>,
    pub delay_ms: Option<u64>,
    #[serde(default)]
    pub proxies: Vec<String>,
}

/// Acknowledgement sent in reply to commands, serialized as `{err, msg}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Success(String),
    Error(String),
}

impl Response {
    pub fn success() -> Self {
        Response::Success("success".to_string())
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Response::Error(msg.into())
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            err: bool,
            msg: &'a str,
        }
        let wire = match self {
            Response::Success(msg) => Wire { err: false, msg },
            Response::Error(msg) => Wire { err: true, msg },
        };
        wire.serialize(serializer)
    }
}
