//! Defines the custom error types for the email-verify application.

use std::io;
use thiserror::Error;

use crate::core::models::JobState;

/// The primary error type for the verification orchestrator.
#[derive(Error, Debug)]
pub enum AppError {
    /// Error occurring during configuration loading or validation.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// Error initializing necessary components (e.g., resolvers, listeners).
    #[error("Initialization Error: {0}")]
    Initialization(String),

    /// Error related to file input/output operations.
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    /// Error during JSON serialization or deserialization.
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error parsing the TOML configuration file.
    #[error("TOML Parsing Error: {0}")]
    Toml(#[from] toml::de::Error),

    /// No verifier is registered for the requested job.
    #[error("verifier not found for job {0}")]
    JobNotFound(i64),

    /// The job is not in a state that allows the requested transition.
    #[error("job {job_id} cannot run from state '{state}'")]
    InvalidState {
        /// The job that rejected the call.
        job_id: i64,
        /// The state the job was in.
        state: JobState,
    },

    /// The bulk persistence adapter failed to commit a batch.
    #[error("Persistence Error (job {job_id}, batch {batch}): {message}")]
    Persistence {
        /// The job whose batch failed.
        job_id: i64,
        /// Index of the batch that was being committed.
        batch: usize,
        /// Underlying failure description.
        message: String,
    },

    /// The event channel connection failed.
    #[error("Channel Error: {0}")]
    Channel(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
