//! Bid timeline routes

use axum::extract::{Path, Query, State};
use std::sync::Arc;
use uuid::Uuid;

use super::bids::ensure_bid;
use crate::api::{Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::timeline::TimelineEvent;
use crate::error::ApiResult;
use crate::services::timeline;

/// GET /bids/:id/timeline
///
/// Newest first.
pub async fn list_timeline(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(bid_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Paginated<TimelineEvent>> {
    ensure_bid(&state, bid_id).await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM timeline_events WHERE bid_id = $1")
        .bind(bid_id)
        .fetch_one(&state.db)
        .await?;

    let events = timeline::list(
        &state.db,
        bid_id,
        params.limit() as i64,
        params.offset() as i64,
    )
    .await?;

    Ok(Paginated::new(events, &params, total as u64))
}
