//! Per-connection command protocol: binds the verifier commands for one job
//! id onto an [`EventChannel`] and runs its read loop.

use std::sync::Arc;

use crate::channel::{ChannelHandle, EventChannel};
use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::{CreateJobRequest, JobId, JobState, Response};
use crate::orchestrator::{Backends, JobRegistry, JobSettings, Verifier};

const NOT_FOUND_MSG: &str = "verifier not found.";
const RUNNING_MSG: &str = "verifier is running.";

/// State shared by every connection.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub registry: JobRegistry,
    pub backends: Backends,
    pub config: Arc<Config>,
}

impl SessionContext {
    pub fn new(registry: JobRegistry, backends: Backends, config: Arc<Config>) -> Self {
        Self {
            registry,
            backends,
            config,
        }
    }
}

/// Announces the job status, registers the command handlers and serves the
/// connection until the peer goes away.
pub async fn serve_connection(mut channel: EventChannel, job_id: JobId, ctx: SessionContext) -> Result<()> {
    let handle = channel.handle();
    match ctx.registry.get(job_id) {
        Some(verifier) => {
            handle.send("status", verifier.state().as_str());
            verifier.attach_channel(handle.clone());
        }
        None => handle.send("status", JobState::NotCreated.as_str()),
    }

    bind_commands(&mut channel, job_id, &ctx);

    tracing::info!(target: "session", "[job {}] connection open", job_id);
    let result = channel.listen().await;
    match &result {
        Err(AppError::Channel(reason)) => {
            tracing::info!(target: "session", "[job {}] connection ended: {}", job_id, reason)
        }
        Err(e) => tracing::warn!(target: "session", "[job {}] connection failed: {}", job_id, e),
        Ok(()) => {}
    }
    channel.close();
    result
}

/// Registers the four verifier commands for `job_id`.
pub fn bind_commands(channel: &mut EventChannel, job_id: JobId, ctx: &SessionContext) {
    let handle = channel.handle();

    {
        let (ctx, handle) = (ctx.clone(), handle.clone());
        channel.on("get-verifier-details", move |_| {
            let (ctx, handle) = (ctx.clone(), handle.clone());
            async move { get_details(&ctx, &handle, job_id) }
        });
    }
    {
        let (ctx, handle) = (ctx.clone(), handle.clone());
        channel.on("create-verifier", move |payload| {
            let (ctx, handle) = (ctx.clone(), handle.clone());
            async move { create(&ctx, &handle, job_id, &payload) }
        });
    }
    {
        let ctx = ctx.clone();
        channel.on("remove-verifier", move |_| {
            let ctx = ctx.clone();
            async move {
                if ctx.registry.remove(job_id).is_some() {
                    tracing::info!(target: "session", "[job {}] verifier removed", job_id);
                }
            }
        });
    }
    {
        let (ctx, handle) = (ctx.clone(), handle.clone());
        channel.on("run-verifier", move |_| {
            let (ctx, handle) = (ctx.clone(), handle.clone());
            async move { start_run(&ctx, &handle, job_id) }
        });
    }
}

fn get_details(ctx: &SessionContext, handle: &ChannelHandle, job_id: JobId) {
    match ctx.registry.get(job_id) {
        Some(verifier) => handle.emit("get-verifier-details-res", &verifier.snapshot()),
        None => handle.emit_err("get-verifier-details-res", NOT_FOUND_MSG),
    }
}

fn create(ctx: &SessionContext, handle: &ChannelHandle, job_id: JobId, payload: &str) {
    let reply = "create-verifier-res";

    let verifier = match build_verifier(ctx, job_id, payload) {
        Ok(v) => Arc::new(v),
        Err(e) => {
            handle.emit_err(reply, e.to_string());
            return;
        }
    };
    if let Err(e) = ctx.registry.replace(job_id, verifier.clone()) {
        tracing::warn!(target: "session", "[job {}] create refused: {}", job_id, e);
        handle.emit_err(reply, RUNNING_MSG);
        return;
    }

    verifier.attach_channel(handle.clone());
    tracing::info!(target: "session", "[job {}] verifier created: {:?}", job_id, verifier.settings());
    handle.emit(reply, &Response::success());
}

fn build_verifier(ctx: &SessionContext, job_id: JobId, payload: &str) -> Result<Verifier> {
    let request: CreateJobRequest = serde_json::from_str(payload)?;
    let settings = JobSettings::from_request(request, &ctx.config)?;
    Verifier::create(job_id, settings, ctx.backends.clone())
}

/// Starts the run on its own task so this connection keeps serving
/// commands, and so a disconnect does not stop the job.
fn start_run(ctx: &SessionContext, handle: &ChannelHandle, job_id: JobId) {
    let reply = "run-verifier-res";
    let (verifier, guard) = match ctx.registry.claim_run(job_id) {
        Ok(claimed) => claimed,
        Err(AppError::JobNotFound(_)) => {
            handle.emit_err(reply, NOT_FOUND_MSG);
            return;
        }
        Err(_) => {
            handle.emit_err(reply, RUNNING_MSG);
            return;
        }
    };

    tokio::spawn(async move {
        let _guard = guard;
        if let Err(e) = verifier.run().await {
            tracing::error!(target: "session", "[job {}] run failed: {}", job_id, e);
            verifier.reporter().emit_err(reply, e.to_string());
        }
    });
}
