use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Note left on a project
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProjectNote {
    pub id: Uuid,
    pub bid_id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_name: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateNoteRequest {
    pub content: String,
}

impl CreateNoteRequest {
    /// Trimmed content, or `None` when blank
    pub fn normalized(&self) -> Option<&str> {
        Some(self.content.trim()).filter(|c| !c.is_empty())
    }
}
