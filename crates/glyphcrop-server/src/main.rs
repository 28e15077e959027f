use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tower_http::services::ServeDir;
use tracing_subscriber::EnvFilter;

use glyphcrop_pipeline::{GlyphPipeline, PipelineConfig};

mod api;
mod cli;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_target(true)
        .init();

    tracing::info!("glyphcrop v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    cli.overrides.apply(&mut config);
    config.validate()?;
    tracing::debug!(?config, "effective configuration");

    let pipeline = GlyphPipeline::new(config);

    match cli.command {
        Command::Serve {
            host,
            port,
            static_dir,
        } => serve(pipeline, &host, port, &static_dir).await?,
        Command::Run {
            inputs,
            out,
            format,
        } => {
            // The batch blocks on the engine; keep it off the async workers.
            tokio::task::spawn_blocking(move || cli::run_batch(&pipeline, &inputs, &out, format))
                .await??;
        }
    }

    Ok(())
}

async fn serve(
    pipeline: GlyphPipeline,
    host: &str,
    port: u16,
    static_dir: &Path,
) -> anyhow::Result<()> {
    let metrics = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("installing metrics recorder")?;

    if !static_dir.is_dir() {
        tracing::warn!(dir = %static_dir.display(), "static directory not found");
    }

    let state = Arc::new(api::AppState {
        pipeline: parking_lot::Mutex::new(pipeline),
        metrics,
        start_time: Instant::now(),
    });

    let app = api::create_router(state)
        .fallback_service(ServeDir::new(static_dir))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    tracing::info!(%addr, static_dir = %static_dir.display(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
