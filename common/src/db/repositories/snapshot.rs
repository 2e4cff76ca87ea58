// Snapshot repository: append-only time series of queue observations per stream

use super::queries;
use crate::db::DbPool;
use crate::errors::{DatabaseError, StoreError};
use crate::models::{MonitoredStream, QueueObservation, SnapshotId, SnapshotRecord};
use async_trait::async_trait;
use tracing::instrument;

/// Storage seam used by the cycle processor
///
/// Implementations must be safe to share across concurrently running cycles;
/// no read-then-insert atomicity is expected of them.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Append a new snapshot row for `observation` under `location`
    async fn insert(
        &self,
        stream: MonitoredStream,
        observation: &QueueObservation,
        location: &str,
    ) -> Result<SnapshotId, StoreError>;

    /// `tickets_left` of the most recent row for `(queue_id, location)`, if any
    async fn latest_tickets_left(
        &self,
        stream: MonitoredStream,
        queue_id: i32,
        location: &str,
    ) -> Result<Option<i32>, StoreError>;

    /// Most recent full row for `(queue_id, location)`, if any
    async fn latest(
        &self,
        stream: MonitoredStream,
        queue_id: i32,
        location: &str,
    ) -> Result<Option<SnapshotRecord>, StoreError>;
}

/// PostgreSQL-backed snapshot store
pub struct PgSnapshotRepository {
    pool: DbPool,
}

impl PgSnapshotRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotRepository {
    #[instrument(skip(self, observation), fields(stream = %stream, queue_id = observation.category_id))]
    async fn insert(
        &self,
        stream: MonitoredStream,
        observation: &QueueObservation,
        location: &str,
    ) -> Result<SnapshotId, StoreError> {
        let operations = serde_json::to_value(&observation.operations)?;

        let snapshot = sqlx::query_as::<_, SnapshotId>(&queries::insert_snapshot(stream))
            .bind(observation.category_id)
            .bind(&observation.category_name)
            .bind(location)
            .bind(observation.ticket_count)
            .bind(observation.tickets_served)
            .bind(observation.workplaces)
            .bind(observation.average_wait_time)
            .bind(observation.average_service_time)
            .bind(observation.registered_tickets)
            .bind(observation.max_tickets)
            .bind(&observation.ticket_value)
            .bind(observation.active)
            .bind(observation.tickets_left)
            .bind(observation.enabled)
            .bind(operations)
            .fetch_one(self.pool.pool())
            .await
            .map_err(DatabaseError::from)?;

        tracing::debug!(
            snapshot_id = snapshot.id,
            location = location,
            tickets_left = observation.tickets_left,
            "Snapshot persisted"
        );
        Ok(snapshot)
    }

    #[instrument(skip(self))]
    async fn latest_tickets_left(
        &self,
        stream: MonitoredStream,
        queue_id: i32,
        location: &str,
    ) -> Result<Option<i32>, StoreError> {
        let tickets_left: Option<i32> =
            sqlx::query_scalar(&queries::select_latest_tickets_left(stream))
                .bind(queue_id)
                .bind(location)
                .fetch_optional(self.pool.pool())
                .await
                .map_err(DatabaseError::from)?;

        Ok(tickets_left)
    }

    #[instrument(skip(self))]
    async fn latest(
        &self,
        stream: MonitoredStream,
        queue_id: i32,
        location: &str,
    ) -> Result<Option<SnapshotRecord>, StoreError> {
        let record = sqlx::query_as::<_, SnapshotRecord>(&queries::select_latest_snapshot(stream))
            .bind(queue_id)
            .bind(location)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(DatabaseError::from)?;

        Ok(record)
    }
}
