//! Project note routes

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::bids::ensure_bid;
use super::changed;
use crate::api::{Created, DataResponse, MessageResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::notes::{CreateNoteRequest, ProjectNote};
use crate::domain::timeline::TimelineEventType;
use crate::error::{ApiError, ApiResult};
use crate::services::{timeline, ChangeEvent, ChangeOp, Table};

/// Longest note excerpt copied into the timeline
const EXCERPT_CHARS: usize = 80;

fn excerpt(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head.trim_end())
    } else {
        head
    }
}

/// GET /bids/:id/notes
pub async fn list_notes(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(bid_id): Path<Uuid>,
) -> ApiResult<DataResponse<Vec<ProjectNote>>> {
    ensure_bid(&state, bid_id).await?;

    let notes = sqlx::query_as::<_, ProjectNote>(
        r#"
        SELECT n.id, n.bid_id, n.user_id, u.name AS user_name, n.content, n.created_at
        FROM project_notes n
        LEFT JOIN users u ON u.id = n.user_id
        WHERE n.bid_id = $1
        ORDER BY n.created_at DESC, n.id
        "#,
    )
    .bind(bid_id)
    .fetch_all(&state.db)
    .await?;

    Ok(DataResponse::new(notes))
}

/// POST /bids/:id/notes
pub async fn add_note(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(bid_id): Path<Uuid>,
    Json(req): Json<CreateNoteRequest>,
) -> ApiResult<Created<ProjectNote>> {
    let content = req
        .normalized()
        .ok_or_else(|| ApiError::bad_request("Note content must not be empty"))?;

    ensure_bid(&state, bid_id).await?;

    let mut tx = state.db.begin().await?;

    let note = sqlx::query_as::<_, ProjectNote>(
        r#"
        WITH inserted AS (
            INSERT INTO project_notes (bid_id, user_id, content)
            VALUES ($1, $2, $3)
            RETURNING id, bid_id, user_id, content, created_at
        )
        SELECT i.id, i.bid_id, i.user_id, u.name AS user_name, i.content, i.created_at
        FROM inserted i
        LEFT JOIN users u ON u.id = i.user_id
        "#,
    )
    .bind(bid_id)
    .bind(auth.user_id)
    .bind(content)
    .fetch_one(&mut *tx)
    .await?;

    timeline::record(
        &mut *tx,
        bid_id,
        auth.user_id,
        TimelineEventType::NoteAdded,
        &format!("Note: {}", excerpt(content)),
        Some(json!({ "note_id": note.id })),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(user_id = %auth.user_id, bid_id = %bid_id, note_id = %note.id, "Note added");
    changed(
        &state,
        ChangeEvent::new(Table::ProjectNotes, ChangeOp::Insert, note.id).for_bid(bid_id),
    )
    .await;

    Ok(Created(note))
}

/// DELETE /bids/:id/notes/:note_id
///
/// Authors may delete their own notes; admins may delete any.
pub async fn delete_note(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((bid_id, note_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<MessageResponse> {
    let author: Option<Option<Uuid>> =
        sqlx::query_scalar("SELECT user_id FROM project_notes WHERE id = $1 AND bid_id = $2")
            .bind(note_id)
            .bind(bid_id)
            .fetch_optional(&state.db)
            .await?;

    let Some(author) = author else {
        return Err(ApiError::not_found("Note not found"));
    };

    if author != Some(auth.user_id) {
        let is_admin: bool =
            sqlx::query_scalar("SELECT COALESCE((SELECT is_admin FROM users WHERE id = $1), FALSE)")
                .bind(auth.user_id)
                .fetch_one(&state.db)
                .await?;
        if !is_admin {
            return Err(ApiError::forbidden("Only the author or an admin can delete this note"));
        }
    }

    sqlx::query("DELETE FROM project_notes WHERE id = $1")
        .bind(note_id)
        .execute(&state.db)
        .await?;

    tracing::info!(user_id = %auth.user_id, bid_id = %bid_id, note_id = %note_id, "Note deleted");
    changed(
        &state,
        ChangeEvent::new(Table::ProjectNotes, ChangeOp::Delete, note_id).for_bid(bid_id),
    )
    .await;

    Ok(MessageResponse::new("Note deleted"))
}
