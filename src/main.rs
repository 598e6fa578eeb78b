use anyhow::Context;
use clap::Parser;
use email_verify_core::core::config::{load_config, validate, ProbeKind};
use email_verify_core::service::{serve, SessionContext};
use email_verify_core::{Backends, JobRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Batch email verification server.
#[derive(Parser, Debug)]
#[command(name = "email-verify", version, about)]
struct Cli {
    /// Path to a TOML configuration file (defaults to ./email-verify.toml).
    #[arg(short, long, env = "EMAIL_VERIFY_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:8000.
    #[arg(short, long, env = "EMAIL_VERIFY_BIND")]
    bind: Option<String>,

    /// Verification probe: dns or simulated.
    #[arg(long, env = "EMAIL_VERIFY_PROBE")]
    probe: Option<ProbeKind>,

    /// Directory holding `<job_id>.txt` address lists.
    #[arg(long)]
    address_dir: Option<PathBuf>,

    /// Directory receiving committed batch files.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }
    if let Some(probe) = cli.probe {
        config.probe = probe;
    }
    if let Some(dir) = cli.address_dir {
        config.address_dir = dir;
    }
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    validate(&config).context("Invalid configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::debug!("Effective configuration: {:?}", config);
    if let Some(path) = &config.loaded_config_path {
        tracing::info!("Loaded configuration from {}", path);
    }

    let backends = Backends::from_config(&config).context("Failed to initialize backends")?;
    let ctx = SessionContext::new(JobRegistry::new(), backends, Arc::new(config));

    serve(ctx).await.context("Server terminated")?;
    Ok(())
}
