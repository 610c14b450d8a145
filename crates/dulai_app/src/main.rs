use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use dulai_engine::TaskOrchestrator;
use engine_logging::{engine_error, engine_info, LogDestination, DEFAULT_LOG_FILE};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = dulai_app::from_env().context("invalid configuration")?;
    engine_logging::initialize(
        LogDestination::Both(PathBuf::from(DEFAULT_LOG_FILE)),
        config.log_level,
    );

    let engine = Arc::new(config.engine);
    let orchestrator = TaskOrchestrator::from_config(engine)
        .context("failed to build the task orchestrator")?;
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                engine_error!("signal_listener_failed error=\"{}\"", err);
                return;
            }
            engine_info!("shutdown_requested");
            shutdown.cancel();
        }
    });

    dulai_app::serve(listener, Arc::new(orchestrator), shutdown)
        .await
        .context("server stopped")?;
    Ok(())
}
