//! Row-change feed
//!
//! Writes announce themselves with `pg_notify` on [`CHANNEL`]. A listener task
//! fans every notification into an in-process broadcast hub, so subscribers on
//! any instance see changes made by every instance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgListener;
use sqlx::{PgExecutor, PgPool};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

pub const CHANNEL: &str = "bidboard_changes";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Bids,
    Vendors,
    BidVendors,
    ApmPhases,
    ProjectNotes,
    TimelineEvents,
    Equipment,
    Users,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Bids => "bids",
            Table::Vendors => "vendors",
            Table::BidVendors => "bid_vendors",
            Table::ApmPhases => "apm_phases",
            Table::ProjectNotes => "project_notes",
            Table::TimelineEvents => "timeline_events",
            Table::Equipment => "equipment",
            Table::Users => "users",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// A row-level change. Subscribers refetch the row if they need it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    pub table: Table,
    pub op: ChangeOp,
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(table: Table, op: ChangeOp, id: Uuid) -> Self {
        Self {
            table,
            op,
            id,
            bid_id: None,
            at: Utc::now(),
        }
    }

    pub fn for_bid(mut self, bid_id: Uuid) -> Self {
        self.bid_id = Some(bid_id);
        self
    }

    /// The bid this change belongs to, if any
    pub fn bid(&self) -> Option<Uuid> {
        match self.table {
            Table::Bids => Some(self.id),
            _ => self.bid_id,
        }
    }
}

/// Subscriber-side filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeFilter {
    #[serde(default)]
    pub table: Option<Table>,
    #[serde(default)]
    pub bid_id: Option<Uuid>,
}

impl ChangeFilter {
    pub fn accepts(&self, event: &ChangeEvent) -> bool {
        self.table.map_or(true, |t| t == event.table)
            && self.bid_id.map_or(true, |b| event.bid() == Some(b))
    }
}

/// In-process fan-out of change events
#[derive(Clone)]
pub struct ChangeHub {
    sender: broadcast::Sender<ChangeEvent>,
    listening: Arc<AtomicBool>,
}

impl ChangeHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Delivers to local subscribers; returns how many received it
    pub fn publish(&self, event: ChangeEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

/// Announce a change through Postgres. Runs inside the caller's transaction
/// when given one, so the event is only delivered on commit.
/// NOTIFY payload for an event, as the listener parses it
pub fn payload(event: &ChangeEvent) -> Result<String, sqlx::Error> {
    serde_json::to_string(event).map_err(|e| sqlx::Error::Protocol(e.to_string()))
}

pub async fn notify<'e>(
    executor: impl PgExecutor<'e>,
    event: &ChangeEvent,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_notify($1, $2)")
        .bind(CHANNEL)
        .bind(payload(event)?)
        .execute(executor)
        .await?;
    Ok(())
}

/// Best-effort variant for handlers: a lost notification must not fail a
/// write that already succeeded.
pub async fn announce(db: &PgPool, event: ChangeEvent) {
    if let Err(e) = notify(db, &event).await {
        tracing::warn!(
            error = %e,
            table = event.table.as_str(),
            id = %event.id,
            "Failed to publish change event"
        );
    }
}

/// Forward Postgres notifications into the hub until the process exits
pub fn spawn_listener(pool: PgPool, hub: ChangeHub) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match run_listener(&pool, &hub).await {
                Ok(()) => break,
                Err(e) => {
                    hub.listening.store(false, Ordering::Relaxed);
                    tracing::warn!(error = %e, "Change listener stopped, reconnecting in 5s");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    })
}

async fn run_listener(pool: &PgPool, hub: &ChangeHub) -> Result<(), sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(CHANNEL).await?;
    hub.listening.store(true, Ordering::Relaxed);
    tracing::info!(channel = CHANNEL, "Listening for row changes");

    loop {
        let notification = listener.recv().await?;
        match serde_json::from_str::<ChangeEvent>(notification.payload()) {
            Ok(event) => {
                let receivers = hub.publish(event);
                tracing::debug!(receivers, "Change event forwarded");
            }
            Err(e) => {
                tracing::warn!(error = %e, payload = notification.payload(), "Ignoring malformed change event");
            }
        }
    }
}
