//! Batch email verification orchestrator.
//!
//! Jobs are created, started and watched over a per-job event channel
//! (WebSocket in production). Each job splits its address list into
//! batches, verifies every address of a batch concurrently, retries
//! transient failures for a bounded number of rounds, rotates proxies
//! between batches and commits each batch's results in one bulk write.

pub mod channel;
pub mod core;
pub mod orchestrator;
pub mod service;
pub mod storage;
pub mod verification;

pub use crate::core::config::Config;
pub use crate::core::error::{AppError, Result};
pub use crate::core::models::{JobId, JobSnapshot, JobState, ProgressSnapshot, ResultRow};
pub use crate::orchestrator::{Backends, JobRegistry, JobSettings, Verifier};
