// Bootstrap utilities for binary initialization
// Every failure here is a startup error and terminates the process.

use crate::calendar::CalendarGate;
use crate::config::Settings;
use crate::cycle::CycleProcessor;
use crate::db::{DbPool, PgSnapshotRepository, SnapshotStore};
use crate::fetcher::{HttpQueueFetcher, QueueFetcher};
use crate::notifier::{Notifier, TelegramNotifier};
use crate::scheduler::{SchedulerConfig, SchedulerEngine};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

pub const STARTUP_MESSAGE: &str = "Starting duw queue monitoring 🫢";

/// Load and validate settings
pub fn load_settings() -> Result<Settings> {
    let settings = Settings::load().context("Failed to load configuration")?;
    settings
        .validate()
        .map_err(|reason| anyhow::anyhow!("Invalid configuration: {}", reason))?;
    Ok(settings)
}

/// Build the Telegram notifier (disabled when credentials are missing)
pub fn init_notifier(settings: &Settings) -> Result<Arc<dyn Notifier>> {
    let notifier = TelegramNotifier::new(settings.telegram.clone())
        .context("Failed to initialize Telegram notifier")?;

    if notifier.is_configured() {
        info!("Telegram notifications enabled");
    } else {
        info!("Telegram not configured, notifications disabled");
    }
    Ok(Arc::new(notifier))
}

/// Send the startup notification; a hard failure here is fatal
#[tracing::instrument(skip_all)]
pub async fn announce_startup(notifier: &dyn Notifier) -> Result<()> {
    notifier
        .notify(STARTUP_MESSAGE)
        .await
        .context("Failed to send startup notification")
}

/// Open the database pool, verify it and apply migrations
#[tracing::instrument(skip(settings))]
pub async fn init_database_pool(settings: &Settings) -> Result<DbPool> {
    let db_pool = DbPool::open(&settings.database)
        .await
        .context("Failed to connect to database")?;

    db_pool
        .health_check()
        .await
        .context("Failed to ping database")?;
    info!("Connected to PostgreSQL database");

    db_pool
        .run_migrations()
        .await
        .context("Failed to create snapshot tables")?;

    Ok(db_pool)
}

/// Wire fetcher, store and notifier into a scheduler engine
pub fn init_scheduler(
    settings: &Settings,
    db_pool: DbPool,
    notifier: Arc<dyn Notifier>,
) -> Result<SchedulerEngine> {
    let fetcher: Arc<dyn QueueFetcher> = Arc::new(
        HttpQueueFetcher::new(&settings.upstream).context("Failed to initialize queue fetcher")?,
    );
    if settings.upstream.proxy.is_some() {
        info!("Rotating proxy egress enabled for upstream fetches");
    }

    let store: Arc<dyn SnapshotStore> = Arc::new(PgSnapshotRepository::new(db_pool));
    let processor = Arc::new(CycleProcessor::new(fetcher, store, notifier));

    let gate = CalendarGate::from_config(&settings.schedule);
    let config = SchedulerConfig::from(&settings.schedule);

    Ok(SchedulerEngine::new(config, gate, processor))
}
