// SQL query fragments for the snapshot tables
// Table names come from `MonitoredStream::table_name`, never from user input.

use crate::models::MonitoredStream;

/// All columns of a snapshot row
pub const SELECT_ALL_COLUMNS: &str = r#"id, queue_id, name, location, ticket_count,
    tickets_served, workplaces, average_wait_time, average_service_time,
    registered_tickets, max_tickets, ticket_value, active, tickets_left,
    enabled, operations, created_at"#;

pub fn insert_snapshot(stream: MonitoredStream) -> String {
    format!(
        r#"
        INSERT INTO {} (
            queue_id, name, location, ticket_count, tickets_served, workplaces,
            average_wait_time, average_service_time, registered_tickets, max_tickets,
            ticket_value, active, tickets_left, enabled, operations
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING id, created_at
        "#,
        stream.table_name()
    )
}

/// Most recent row for `(queue_id, location)`; `id` breaks timestamp ties
pub fn select_latest_tickets_left(stream: MonitoredStream) -> String {
    format!(
        r#"
        SELECT tickets_left
        FROM {}
        WHERE queue_id = $1 AND location = $2
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
        stream.table_name()
    )
}

pub fn select_latest_snapshot(stream: MonitoredStream) -> String {
    format!(
        r#"
        SELECT {}
        FROM {}
        WHERE queue_id = $1 AND location = $2
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
        SELECT_ALL_COLUMNS,
        stream.table_name()
    )
}
