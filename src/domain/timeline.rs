//! Timeline events recorded against a bid

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum TimelineEventType {
    Created,
    StatusChanged,
    FieldUpdated,
    NoteAdded,
    VendorAdded,
    VendorRemoved,
    VendorResponse,
    CostReceived,
    PutOnHold,
    Resumed,
    Archived,
    Unarchived,
    SentToApm,
    ReturnedToEstimating,
    ApmPhaseUpdated,
    EquipmentUpdated,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TimelineEvent {
    pub id: Uuid,
    pub bid_id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_name: Option<String>,
    pub event_type: TimelineEventType,
    pub description: String,
    pub metadata: sqlx::types::Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
