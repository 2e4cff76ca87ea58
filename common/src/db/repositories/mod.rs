// Repository layer for database operations

pub mod queries;
pub mod snapshot;

pub use snapshot::{PgSnapshotRepository, SnapshotStore};
