#![allow(clippy::must_use_candidate)]

mod args;

use std::path::Path;

use args::Args;
use clap::Parser;
use relaymux_config::{Config, LoggingConfig};
use relaymux_init::Initializer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;
    init_tracing(&config.logging);

    tracing::info!(config_path = %args.config.display(), "starting relaymux");

    let initializer = Initializer::new();
    let result = initializer.initialize(&config).await?;

    if !result.success {
        for error in &result.errors {
            tracing::error!(%error, "initialization failed");
        }
        anyhow::bail!("initialization failed with {} error(s)", result.errors.len());
    }

    for warning in &result.warnings {
        tracing::warn!(%warning, "router entry skipped");
    }

    let config_name = args.config.file_stem().and_then(|s| s.to_str()).unwrap_or("relaymux").to_owned();
    relaymux_pipeline::persist_pipeline_table(
        &result.pipeline_table,
        &config_name,
        &args.config.display().to_string(),
        Path::new("pipeline-tables"),
        Path::new("pipeline-tables/debug"),
        config.server.port,
    );

    tracing::info!(
        pipelines = result.pipelines.len(),
        virtual_models = result.pipeline_table.by_virtual_model.len(),
        table_build_ms = result.timings.table_build.as_millis(),
        pipeline_construction_ms = result.timings.pipeline_construction.as_millis(),
        total_ms = result.timings.total.as_millis(),
        "gateway initialized"
    );

    // No HTTP listening surface here — that is an external collaborator
    // (relaymux_core::HttpError exists for whatever hosts one). This binary
    // wires up C7 and keeps the scheduler's health-check ticking until told
    // to stop.
    let _health_check = result.scheduler.spawn_health_check_task();

    shutdown_signal().await;
    tracing::info!("relaymux stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&logging.filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    if logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Wait for a shutdown signal (`SIGINT` or `SIGTERM`)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
