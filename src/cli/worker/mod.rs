//! Worker command - consumes the task queue

use std::sync::Arc;

use clap::Args;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::infrastructure::kv::StoreType;
use crate::{create_components, create_task_processor};

use super::{bootstrap, shutdown_signal};

#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// Override the configured number of concurrent handlers
    #[arg(long)]
    pub concurrency: Option<usize>,
}

/// Run handler loops until Ctrl+C/SIGTERM, then drain in-flight tasks
pub async fn run(args: WorkerArgs) -> anyhow::Result<()> {
    let mut config = bootstrap()?;
    if let Some(concurrency) = args.concurrency {
        config.tasks.concurrency = concurrency;
    }

    if config.tasks.queue_backend == StoreType::InMemory {
        warn!("In-memory task queue only holds tasks enqueued by this process");
    }

    let components = create_components(&config).await?;
    let processor = Arc::new(create_task_processor(&config, &components)?);
    info!(
        queue = %config.tasks.queue_name,
        concurrency = processor.config().concurrency,
        "Starting worker"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(processor.run(shutdown_rx));

    shutdown_signal().await;
    info!("Waiting for in-flight tasks");
    shutdown_tx.send_replace(true);
    worker.await?;

    info!("Worker shutdown complete");
    Ok(())
}
