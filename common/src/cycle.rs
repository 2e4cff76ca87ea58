// Cycle processor: one fetch -> detect -> persist -> notify pass
//
// The prior lookup and the insert are separate statements. Overlapping cycles can
// read the same stale baseline, so duplicate or missed notifications are possible;
// this race is accepted and not mitigated here.

use crate::db::SnapshotStore;
use crate::detector::Transition;
use crate::errors::{FetchError, StoreError};
use crate::fetcher::QueueFetcher;
use crate::models::{MonitoredStream, QueueObservation};
use crate::notifier::Notifier;
use crate::telemetry;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Counters describing what a single cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub observations: usize,
    pub persisted: usize,
    pub ignored: usize,
    pub failed: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
}

/// Result of handling a single observation that belongs to a monitored stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationOutcome {
    pub stream: MonitoredStream,
    pub snapshot_id: i64,
    pub transition: Option<Transition>,
    pub notified: Option<bool>,
}

/// Runs cycles against shared collaborators; cheap to share across tasks via `Arc`
pub struct CycleProcessor {
    fetcher: Arc<dyn QueueFetcher>,
    store: Arc<dyn SnapshotStore>,
    notifier: Arc<dyn Notifier>,
}

impl CycleProcessor {
    pub fn new(
        fetcher: Arc<dyn QueueFetcher>,
        store: Arc<dyn SnapshotStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            fetcher,
            store,
            notifier,
        }
    }

    /// Fetch the queue status and process every observation in it
    ///
    /// Only a fetch failure aborts the cycle; per-observation failures are
    /// logged and counted in the report.
    #[instrument(skip(self), fields(cycle_id = %Uuid::new_v4()))]
    pub async fn run_cycle(&self) -> Result<CycleReport, FetchError> {
        info!("Fetching queue data");

        let status = match self.fetcher.fetch().await {
            Ok(status) => status,
            Err(e) => {
                error!(error = %e, "Error fetching queue data");
                telemetry::record_cycle("fetch_failed");
                return Err(e);
            }
        };

        let mut report = CycleReport::default();

        for (location, observation) in status.observations() {
            report.observations += 1;

            let Some(stream) = MonitoredStream::from_category_name(&observation.category_name)
            else {
                report.ignored += 1;
                continue;
            };

            match self.process_observation(stream, observation, location).await {
                Ok(outcome) => {
                    report.persisted += 1;
                    match outcome.notified {
                        Some(true) => report.notifications_sent += 1,
                        Some(false) => report.notifications_failed += 1,
                        None => {}
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    error!(
                        stream = %stream,
                        queue_id = observation.category_id,
                        location = location,
                        error = %e,
                        "Error saving snapshot"
                    );
                }
            }
        }

        info!(
            observations = report.observations,
            persisted = report.persisted,
            ignored = report.ignored,
            failed = report.failed,
            notifications_sent = report.notifications_sent,
            "Cycle completed"
        );
        telemetry::record_cycle(if report.failed == 0 {
            "completed"
        } else {
            "partial"
        });

        Ok(report)
    }

    /// Detect a transition (card pickup only), persist, then notify on success
    #[instrument(
        skip(self, observation),
        fields(stream = %stream, queue_id = observation.category_id, tickets_left = observation.tickets_left)
    )]
    pub async fn process_observation(
        &self,
        stream: MonitoredStream,
        observation: &QueueObservation,
        location: &str,
    ) -> Result<ObservationOutcome, StoreError> {
        let transition = if stream.tracks_transitions() {
            let prior = self.prior_tickets_left(stream, observation, location).await;
            Transition::classify(prior, observation.tickets_left)
        } else {
            None
        };

        let snapshot = self.store.insert(stream, observation, location).await?;
        telemetry::record_snapshot_persisted(&stream.to_string());

        let notified = match transition {
            Some(transition) => {
                telemetry::record_transition(transition.kind());
                info!(transition = %transition, "Ticket availability changed");
                let message = transition.message(location, observation.category_id);
                Some(self.deliver(&message).await)
            }
            None => None,
        };

        Ok(ObservationOutcome {
            stream,
            snapshot_id: snapshot.id,
            transition,
            notified,
        })
    }

    /// A failed lookup counts as "no baseline"; the observation is still persisted
    async fn prior_tickets_left(
        &self,
        stream: MonitoredStream,
        observation: &QueueObservation,
        location: &str,
    ) -> Option<i32> {
        match self
            .store
            .latest_tickets_left(stream, observation.category_id, location)
            .await
        {
            Ok(prior) => {
                debug!(prior_tickets_left = ?prior, "Loaded previous tickets_left");
                prior
            }
            Err(e) => {
                warn!(error = %e, "Failed to get previous tickets_left");
                None
            }
        }
    }

    /// Send a message, swallowing failures; returns whether delivery succeeded
    async fn deliver(&self, message: &str) -> bool {
        match self.notifier.notify(message).await {
            Ok(()) => {
                telemetry::record_notification("sent");
                true
            }
            Err(e) => {
                telemetry::record_notification("failed");
                warn!(error = %e, "Failed to send notification");
                false
            }
        }
    }
}
