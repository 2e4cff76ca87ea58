use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Upstream Payload
// ============================================================================

/// Decoded body of the queue-status endpoint: location -> queue items
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStatus {
    #[serde(default, deserialize_with = "locations_or_empty")]
    pub result: BTreeMap<String, Vec<QueueObservation>>,
}

impl QueueStatus {
    /// Iterate every observation together with the location it was grouped under
    pub fn observations(&self) -> impl Iterator<Item = (&str, &QueueObservation)> {
        self.result
            .iter()
            .flat_map(|(location, items)| items.iter().map(move |item| (location.as_str(), item)))
    }

    /// Total number of observations across all locations
    pub fn len(&self) -> usize {
        self.result.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single queue item as reported by the upstream API for one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueObservation {
    #[serde(rename = "id", default, deserialize_with = "null_as_default")]
    pub category_id: i32,
    #[serde(rename = "name", default, deserialize_with = "null_as_default")]
    pub category_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub operations: Vec<Operation>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ticket_count: i32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tickets_served: i32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub workplaces: i32,
    #[serde(default)]
    pub average_wait_time: Option<i32>,
    #[serde(default)]
    pub average_service_time: Option<i32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub registered_tickets: i32,
    #[serde(default)]
    pub max_tickets: Option<i32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ticket_value: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub active: bool,
    /// Location echoed inside the item; the grouping key is authoritative
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tickets_left: i32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub enabled: bool,
}

/// Operation sub-record attached to a queue item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub enabled: bool,
}

/// Explicit JSON `null` decodes to the field's zero value, like a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn locations_or_empty<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, Vec<QueueObservation>>, D::Error>
where
    D: Deserializer<'de>,
{
    let locations: Option<BTreeMap<String, Option<Vec<QueueObservation>>>> =
        Option::deserialize(deserializer)?;
    Ok(locations
        .unwrap_or_default()
        .into_iter()
        .map(|(location, items)| (location, items.unwrap_or_default()))
        .collect())
}

// ============================================================================
// Monitored Streams
// ============================================================================

/// Queue categories whose observations are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitoredStream {
    /// "odbiór karty": residence card pickup, evaluated for transitions
    CardPickup,
    /// "Odbiór karty - wieczory": evening pickup, persisted only
    CardPickupEvening,
}

impl MonitoredStream {
    pub const ALL: [MonitoredStream; 2] =
        [MonitoredStream::CardPickup, MonitoredStream::CardPickupEvening];

    /// Route an observation by exact category name match
    pub fn from_category_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|stream| stream.category_name() == name)
    }

    pub fn category_name(&self) -> &'static str {
        match self {
            MonitoredStream::CardPickup => "odbiór karty",
            MonitoredStream::CardPickupEvening => "Odbiór karty - wieczory",
        }
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            MonitoredStream::CardPickup => "odbior_karty",
            MonitoredStream::CardPickupEvening => "odbior_karty_wieczory",
        }
    }

    /// Whether ticket-availability transitions are evaluated for this stream
    pub fn tracks_transitions(&self) -> bool {
        matches!(self, MonitoredStream::CardPickup)
    }
}

impl fmt::Display for MonitoredStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitoredStream::CardPickup => write!(f, "card_pickup"),
            MonitoredStream::CardPickupEvening => write!(f, "card_pickup_evening"),
        }
    }
}

// ============================================================================
// Persisted Snapshots
// ============================================================================

/// One persisted observation row; append-only
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct SnapshotRecord {
    pub id: i64,
    pub queue_id: i32,
    pub name: String,
    pub location: String,
    pub ticket_count: i32,
    pub tickets_served: i32,
    pub workplaces: i32,
    pub average_wait_time: Option<i32>,
    pub average_service_time: Option<i32>,
    pub registered_tickets: i32,
    pub max_tickets: Option<i32>,
    pub ticket_value: String,
    pub active: bool,
    pub tickets_left: i32,
    pub enabled: bool,
    #[sqlx(json)]
    pub operations: Vec<Operation>,
    pub created_at: DateTime<Utc>,
}

impl SnapshotRecord {
    /// Rebuild the observation this row was written from, with the stored location
    pub fn to_observation(&self) -> QueueObservation {
        QueueObservation {
            category_id: self.queue_id,
            category_name: self.name.clone(),
            operations: self.operations.clone(),
            ticket_count: self.ticket_count,
            tickets_served: self.tickets_served,
            workplaces: self.workplaces,
            average_wait_time: self.average_wait_time,
            average_service_time: self.average_service_time,
            registered_tickets: self.registered_tickets,
            max_tickets: self.max_tickets,
            ticket_value: self.ticket_value.clone(),
            active: self.active,
            location: self.location.clone(),
            tickets_left: self.tickets_left,
            enabled: self.enabled,
        }
    }
}

/// Identity and server-assigned timestamp of an inserted snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct SnapshotId {
    pub id: i64,
    pub created_at: DateTime<Utc>,
}
