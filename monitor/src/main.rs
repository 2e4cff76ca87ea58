// Monitor binary entry point
//
// Startup order: config -> logging -> startup notification -> database -> tick loop.
// Only startup failures end the process; everything after that is contained per cycle.

use common::bootstrap;
use common::scheduler::Scheduler;
use common::telemetry;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = bootstrap::load_settings()?;

    telemetry::init_logging(&settings.observability.log_level)?;
    if let Some(port) = settings.observability.metrics_port {
        telemetry::init_metrics(port)?;
    }

    for warning in &settings.load_warnings {
        warn!("{}", warning);
    }

    info!(
        database_host = %settings.database.host,
        database_name = %settings.database.name,
        upstream_url = %settings.upstream.url,
        "Configuration loaded"
    );

    let notifier = bootstrap::init_notifier(&settings)?;
    bootstrap::announce_startup(notifier.as_ref())
        .await
        .inspect_err(|e| error!(error = %e, "Startup notification failed"))?;

    let db_pool = bootstrap::init_database_pool(&settings)
        .await
        .inspect_err(|e| error!(error = %e, "Database initialization failed"))?;

    let scheduler = Arc::new(bootstrap::init_scheduler(
        &settings,
        db_pool.clone(),
        notifier,
    )?);

    let scheduler_for_shutdown = Arc::clone(&scheduler);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        info!("Received Ctrl+C signal, initiating graceful shutdown");
        scheduler_for_shutdown.request_shutdown();
    });

    let run_result = scheduler.start().await;

    // Drain in-flight cycles before the pool goes away
    if let Err(e) = scheduler.stop().await {
        error!(error = %e, "Error during scheduler shutdown");
    }
    db_pool.close().await;

    run_result.map_err(|e| anyhow::anyhow!("Scheduler error: {}", e))?;
    info!("Monitor stopped");
    Ok(())
}
