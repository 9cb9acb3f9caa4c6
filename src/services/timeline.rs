//! Timeline recording
//!
//! Called by routes alongside the write that caused the event, usually inside
//! the same transaction.

use serde_json::Value;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::domain::timeline::{TimelineEvent, TimelineEventType};
use crate::services::realtime::{self, ChangeEvent, ChangeOp, Table};

/// Change announced when an event is appended to a bid's timeline
pub fn change_for(event_id: Uuid, bid_id: Uuid) -> ChangeEvent {
    ChangeEvent::new(Table::TimelineEvents, ChangeOp::Insert, event_id).for_bid(bid_id)
}

/// Append an event to a bid's timeline and announce it on the change feed.
/// Inside a transaction the announcement goes out on commit.
pub async fn record<'e>(
    executor: impl PgExecutor<'e>,
    bid_id: Uuid,
    user_id: Uuid,
    event_type: TimelineEventType,
    description: &str,
    metadata: Option<Value>,
) -> Result<Uuid, sqlx::Error> {
    let metadata = metadata.unwrap_or_else(|| serde_json::json!({}));
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        WITH inserted AS (
            INSERT INTO timeline_events (id, bid_id, user_id, event_type, description, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
        )
        SELECT pg_notify($7, $8) FROM inserted
        "#,
    )
    .bind(id)
    .bind(bid_id)
    .bind(user_id)
    .bind(event_type)
    .bind(description)
    .bind(&metadata)
    .bind(realtime::CHANNEL)
    .bind(realtime::payload(&change_for(id, bid_id))?)
    .execute(executor)
    .await?;

    tracing::debug!(
        bid_id = %bid_id,
        event_type = ?event_type,
        event_id = %id,
        "Timeline event recorded"
    );

    Ok(id)
}

/// Newest first, with the acting user's name
pub async fn list<'e>(
    executor: impl PgExecutor<'e>,
    bid_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<TimelineEvent>, sqlx::Error> {
    sqlx::query_as::<_, TimelineEvent>(
        r#"
        SELECT t.id, t.bid_id, t.user_id, u.name AS user_name, t.event_type,
               t.description, t.metadata, t.created_at
        FROM timeline_events t
        LEFT JOIN users u ON u.id = t.user_id
        WHERE t.bid_id = $1
        ORDER BY t.created_at DESC, t.id
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(bid_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::realtime::{ChangeFilter, ChangeHub};

    #[tokio::test]
    async fn recorded_events_reach_timeline_subscribers() {
        let bid_id = Uuid::new_v4();
        let event_id = Uuid::new_v4();

        let hub = ChangeHub::new(8);
        let mut rx = hub.subscribe();

        // Same path as a NOTIFY: payload out, listener parse, hub fan-out
        let wire = realtime::payload(&change_for(event_id, bid_id)).unwrap();
        let parsed: ChangeEvent = serde_json::from_str(&wire).unwrap();
        assert_eq!(hub.publish(parsed), 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.table, Table::TimelineEvents);
        assert_eq!(received.op, ChangeOp::Insert);
        assert_eq!(received.id, event_id);

        let timeline_of_bid = ChangeFilter {
            table: Some(Table::TimelineEvents),
            bid_id: Some(bid_id),
        };
        assert!(timeline_of_bid.accepts(&received));

        let other_bid = ChangeFilter {
            table: Some(Table::TimelineEvents),
            bid_id: Some(Uuid::new_v4()),
        };
        assert!(!other_bid.accepts(&received));
    }
}
