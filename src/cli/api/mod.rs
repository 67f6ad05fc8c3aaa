//! API command - runs the HTTP server

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::create_router;
use crate::config::AppConfig;
use crate::infrastructure::kv::StoreType;
use crate::infrastructure::observability::init_metrics;
use crate::{create_app_state, create_components, create_task_processor};

use super::{bootstrap, shutdown_signal};

/// Run the API server
pub async fn run() -> anyhow::Result<()> {
    let config = bootstrap()?;

    let components = create_components(&config).await?;
    let state = create_app_state(&config, &components).await?;
    let metrics = init_metrics(&config.metrics);
    let app = create_router(state, metrics, &config.metrics.path);

    // A separate worker process cannot reach an in-memory queue
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let embedded_worker = if config.tasks.queue_backend == StoreType::InMemory {
        warn!("In-memory task queue, running the task processor inside the API process");
        let processor = Arc::new(create_task_processor(&config, &components)?);
        Some(tokio::spawn(processor.run(shutdown_rx)))
    } else {
        None
    };

    let addr = build_socket_addr(&config)?;
    info!("Starting API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(worker) = embedded_worker {
        shutdown_tx.send_replace(true);
        worker.await?;
    }

    info!("API server shutdown complete");
    Ok(())
}

fn build_socket_addr(config: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    )))
}
