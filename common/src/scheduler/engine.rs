// Scheduler engine: fixed-cadence ticks gated by the working-hours calendar
//
// Each passing tick spawns an independent cycle and returns without waiting for it.
// In-flight cycles are capped by a semaphore; a tick that finds the cap saturated
// is skipped. Running cycles are never cancelled.

use crate::calendar::{CalendarGate, GateDecision};
use crate::config::ScheduleConfig;
use crate::cycle::CycleProcessor;
use crate::telemetry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often to tick (in seconds)
    pub poll_interval_seconds: u64,
    /// Upper bound on concurrently running cycles
    pub max_concurrent_cycles: usize,
    /// How long `stop` waits for in-flight cycles
    pub shutdown_grace_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 10,
            max_concurrent_cycles: 16,
            shutdown_grace_seconds: 30,
        }
    }
}

impl From<&ScheduleConfig> for SchedulerConfig {
    fn from(config: &ScheduleConfig) -> Self {
        Self {
            poll_interval_seconds: config.poll_interval_seconds,
            max_concurrent_cycles: config.max_concurrent_cycles,
            shutdown_grace_seconds: config.shutdown_grace_seconds,
        }
    }
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Gate closed; no cycle started
    Skipped(GateDecision),
    /// Every cycle slot is busy; no cycle started
    Saturated,
    /// A cycle was spawned
    Spawned,
}

/// Scheduler trait for the polling loop
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Start the tick loop; returns after `stop` is called
    async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Stop the tick loop and wait for in-flight cycles
    async fn stop(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Evaluate the gate once and spawn a cycle if it passes
    fn tick(&self) -> TickOutcome;
}

/// Main scheduler engine implementation
pub struct SchedulerEngine {
    config: SchedulerConfig,
    gate: CalendarGate,
    processor: Arc<CycleProcessor>,
    cycle_slots: Arc<Semaphore>,
    shutdown_tx: watch::Sender<bool>,
}

impl SchedulerEngine {
    /// Create a new scheduler engine
    pub fn new(config: SchedulerConfig, gate: CalendarGate, processor: Arc<CycleProcessor>) -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        let slots = config.max_concurrent_cycles.max(1);

        Self {
            config,
            gate,
            processor,
            cycle_slots: Arc::new(Semaphore::new(slots)),
            shutdown_tx,
        }
    }

    /// Get a shutdown signal receiver; the flag stays set once raised
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Signal the tick loop to exit without waiting for in-flight cycles
    pub fn request_shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Number of cycles currently running
    pub fn cycles_in_flight(&self) -> usize {
        self.capacity() - self.cycle_slots.available_permits()
    }

    fn capacity(&self) -> usize {
        self.config.max_concurrent_cycles.max(1)
    }

    /// Tick as if the wall clock read `now`
    pub fn tick_at(&self, now: DateTime<Utc>) -> TickOutcome {
        let decision = self.gate.evaluate(now);
        if !decision.is_open() {
            info!(
                reason = %decision,
                start_hour = self.gate.start_hour(),
                end_hour = self.gate.end_hour(),
                timezone = self.gate.timezone_name(),
                "Skipping fetch"
            );
            telemetry::record_tick_skipped(decision.reason());
            return TickOutcome::Skipped(decision);
        }

        let permit = match Arc::clone(&self.cycle_slots).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    max_concurrent_cycles = self.capacity(),
                    "All cycle slots busy, skipping fetch"
                );
                telemetry::record_tick_skipped("saturated");
                return TickOutcome::Saturated;
            }
        };

        let processor = Arc::clone(&self.processor);
        let slots = Arc::clone(&self.cycle_slots);
        let capacity = self.capacity();
        telemetry::update_cycles_in_flight(capacity - slots.available_permits());

        tokio::spawn(async move {
            // Errors are already logged inside the cycle
            let _ = processor.run_cycle().await;
            drop(permit);
            telemetry::update_cycles_in_flight(capacity - slots.available_permits());
        });

        TickOutcome::Spawned
    }

    /// Wait until every cycle slot is free again, bounded by `grace`
    async fn drain(&self, grace: Duration) -> bool {
        let capacity = self.capacity() as u32;
        match timeout(grace, self.cycle_slots.acquire_many(capacity)).await {
            Ok(Ok(permits)) => {
                drop(permits);
                true
            }
            Ok(Err(_)) | Err(_) => false,
        }
    }
}

#[async_trait]
impl Scheduler for SchedulerEngine {
    #[instrument(skip(self))]
    async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(
            poll_interval_seconds = self.config.poll_interval_seconds,
            start_hour = self.gate.start_hour(),
            end_hour = self.gate.end_hour(),
            timezone = self.gate.timezone_name(),
            max_concurrent_cycles = self.capacity(),
            "Starting queue monitoring"
        );

        let mut shutdown_rx = self.shutdown_receiver();
        let already_stopped = *shutdown_rx.borrow_and_update();
        if already_stopped {
            info!("Shutdown requested before start, not ticking");
            return Ok(());
        }

        let mut ticker = interval(Duration::from_secs(self.config.poll_interval_seconds));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick of a tokio interval completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = self.tick();
                    debug!(outcome = ?outcome, "Tick evaluated");
                }
                _ = shutdown_rx.changed() => {
                    info!("Shutdown signal received, stopping scheduler");
                    break;
                }
            }
        }

        info!("Scheduler engine stopped");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(
            cycles_in_flight = self.cycles_in_flight(),
            "Stopping scheduler engine"
        );

        self.request_shutdown();

        let grace = Duration::from_secs(self.config.shutdown_grace_seconds);
        if self.drain(grace).await {
            info!("Scheduler engine stopped gracefully");
        } else {
            error!(
                cycles_in_flight = self.cycles_in_flight(),
                grace_seconds = grace.as_secs(),
                "In-flight cycles still running after grace period"
            );
        }
        Ok(())
    }

    fn tick(&self) -> TickOutcome {
        self.tick_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.poll_interval_seconds, 10);
        assert_eq!(config.max_concurrent_cycles, 16);
        assert_eq!(config.shutdown_grace_seconds, 30);
    }

    #[test]
    fn test_scheduler_config_from_settings() {
        let settings = crate::config::Settings::default();
        let config = SchedulerConfig::from(&settings.schedule);
        assert_eq!(config.poll_interval_seconds, 10);
        assert_eq!(config.max_concurrent_cycles, 16);
    }
}
