//! Bid routes
//!
//! The board itself: listing a view, the bid lifecycle, and moving bids
//! between the Estimating and APM views.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde_json::json;
use sqlx::{PgExecutor, PgPool};
use std::sync::Arc;
use uuid::Uuid;

use super::changed;
use crate::api::{Created, DataResponse, MessageResponse, Paginated};
use crate::app::AppState;
use crate::auth::{RequireAdmin, RequireAuth};
use crate::domain::bids::{
    Bid, BidResponse, BidStatus, CreateBidRequest, SendToApmRequest, SetStatusRequest,
    UpdateBidRequest, BID_COLUMNS,
};
use crate::domain::lifecycle;
use crate::domain::money::{cents_to_decimal, check_cents};
use crate::domain::patch::split;
use crate::domain::timeline::TimelineEventType;
use crate::domain::views::{BoardView, Placement};
use crate::domain::UrgencyContext;
use crate::error::{ApiError, ApiResult};
use crate::services::board::{self, BidListQuery};
use crate::services::{timeline, ChangeEvent, ChangeOp, Table};

/// Load a bid or 404
pub(crate) async fn fetch_bid<'e>(executor: impl PgExecutor<'e>, bid_id: Uuid) -> ApiResult<Bid> {
    sqlx::query_as::<_, Bid>(&format!("SELECT {} FROM bids WHERE id = $1", BID_COLUMNS))
        .bind(bid_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| ApiError::not_found("Bid not found"))
}

/// Row-locking variant for read-modify-write inside a transaction
async fn lock_bid<'e>(executor: impl PgExecutor<'e>, bid_id: Uuid) -> ApiResult<Bid> {
    sqlx::query_as::<_, Bid>(&format!(
        "SELECT {} FROM bids WHERE id = $1 FOR UPDATE",
        BID_COLUMNS
    ))
    .bind(bid_id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| ApiError::not_found("Bid not found"))
}

/// Make sure a bid exists before touching its children
pub(crate) async fn ensure_bid(state: &AppState, bid_id: Uuid) -> ApiResult<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM bids WHERE id = $1)")
        .bind(bid_id)
        .fetch_one(&state.db)
        .await?;
    if !exists {
        return Err(ApiError::not_found("Bid not found"));
    }
    Ok(())
}

/// Every bid in a board view, with urgency computed
pub(crate) async fn load_view(
    db: &PgPool,
    view: BoardView,
    ctx: &UrgencyContext,
) -> ApiResult<Vec<BidResponse>> {
    let rows = sqlx::query_as::<_, Bid>(&format!(
        "SELECT {} FROM bids WHERE {}",
        BID_COLUMNS,
        view.sql_predicate()
    ))
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|b| BidResponse::from_bid(b, ctx))
        .collect())
}

fn validate_money(field: &str, cents: Option<i64>) -> ApiResult<()> {
    if let Some(c) = cents {
        check_cents(field, c).map_err(ApiError::bad_request)?;
    }
    Ok(())
}

fn bid_event(op: ChangeOp, bid_id: Uuid) -> ChangeEvent {
    ChangeEvent::new(Table::Bids, op, bid_id)
}

/// GET /bids
///
/// One board view, filtered, sorted and paginated.
pub async fn list_bids(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(query): Query<BidListQuery>,
) -> ApiResult<Paginated<BidResponse>> {
    let view = query.view()?;
    let filter = query.filter()?;
    let (field, direction) = query.sort();
    let params = query.pagination();

    let bids = load_view(&state.db, view, &state.urgency_context()).await?;
    let bids = board::apply(bids, &filter, field, direction);
    Ok(Paginated::from_items(bids, &params))
}

/// POST /bids
pub async fn create_bid(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBidRequest>,
) -> ApiResult<Created<BidResponse>> {
    let project_name = req.project_name.trim();
    if project_name.is_empty() {
        return Err(ApiError::bad_request("project_name is required"));
    }
    validate_money("estimated_value", req.estimated_value)?;

    let now = Utc::now();
    let stamp = |status: BidStatus| (req.status == status).then_some(now);

    let mut tx = state.db.begin().await?;

    let bid = sqlx::query_as::<_, Bid>(&format!(
        r#"
        INSERT INTO bids (project_name, project_address, general_contractor, project_description,
                          due_date, status, estimated_value, assigned_to, created_by,
                          bid_sent_at, won_at, lost_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING {}
        "#,
        BID_COLUMNS
    ))
    .bind(project_name)
    .bind(&req.project_address)
    .bind(&req.general_contractor)
    .bind(&req.project_description)
    .bind(req.due_date)
    .bind(req.status)
    .bind(req.estimated_value.map(cents_to_decimal))
    .bind(req.assigned_to)
    .bind(auth.user_id)
    .bind(stamp(BidStatus::BidSent))
    .bind(stamp(BidStatus::Won))
    .bind(stamp(BidStatus::Lost))
    .fetch_one(&mut *tx)
    .await?;

    timeline::record(
        &mut *tx,
        bid.id,
        auth.user_id,
        TimelineEventType::Created,
        &format!("Created project {}", bid.project_name),
        Some(json!({ "status": bid.status })),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(user_id = %auth.user_id, bid_id = %bid.id, "Bid created");
    changed(&state, bid_event(ChangeOp::Insert, bid.id)).await;

    Ok(Created(BidResponse::from_bid(bid, &state.urgency_context())))
}

/// GET /bids/:id
pub async fn get_bid(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(bid_id): Path<Uuid>,
) -> ApiResult<DataResponse<BidResponse>> {
    let bid = fetch_bid(&state.db, bid_id).await?;
    Ok(DataResponse::new(BidResponse::from_bid(
        bid,
        &state.urgency_context(),
    )))
}

/// PATCH /bids/:id
pub async fn update_bid(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(bid_id): Path<Uuid>,
    Json(req): Json<UpdateBidRequest>,
) -> ApiResult<DataResponse<BidResponse>> {
    if req.project_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("project_name must not be empty"));
    }
    validate_money("estimated_value", req.estimated_value.flatten())?;

    let fields = req.changed_fields();
    if fields.is_empty() {
        return get_bid(auth, State(state), Path(bid_id)).await;
    }

    let (set_address, address) = split(&req.project_address);
    let (set_gc, gc) = split(&req.general_contractor);
    let (set_description, description) = split(&req.project_description);
    let (set_due, due_date) = split(&req.due_date);
    let (set_value, value) = split(&req.estimated_value);
    let (set_assignee, assignee) = split(&req.assigned_to);

    let mut tx = state.db.begin().await?;

    let bid = sqlx::query_as::<_, Bid>(&format!(
        r#"
        UPDATE bids SET
            project_name = COALESCE($2, project_name),
            project_address = CASE WHEN $3 THEN $4 ELSE project_address END,
            general_contractor = CASE WHEN $5 THEN $6 ELSE general_contractor END,
            project_description = CASE WHEN $7 THEN $8 ELSE project_description END,
            due_date = CASE WHEN $9 THEN $10 ELSE due_date END,
            estimated_value = CASE WHEN $11 THEN $12 ELSE estimated_value END,
            assigned_to = CASE WHEN $13 THEN $14 ELSE assigned_to END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        BID_COLUMNS
    ))
    .bind(bid_id)
    .bind(req.project_name.as_deref().map(str::trim))
    .bind(set_address)
    .bind(address)
    .bind(set_gc)
    .bind(gc)
    .bind(set_description)
    .bind(description)
    .bind(set_due)
    .bind(due_date)
    .bind(set_value)
    .bind(value.map(cents_to_decimal))
    .bind(set_assignee)
    .bind(assignee)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Bid not found"))?;

    timeline::record(
        &mut *tx,
        bid.id,
        auth.user_id,
        TimelineEventType::FieldUpdated,
        &format!("Updated {}", fields.join(", ")),
        Some(json!({ "fields": fields })),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(user_id = %auth.user_id, bid_id = %bid.id, fields = ?fields, "Bid updated");
    changed(&state, bid_event(ChangeOp::Update, bid.id)).await;

    Ok(DataResponse::new(BidResponse::from_bid(
        bid,
        &state.urgency_context(),
    )))
}

/// DELETE /bids/:id
pub async fn delete_bid(
    admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(bid_id): Path<Uuid>,
) -> ApiResult<MessageResponse> {
    let deleted = sqlx::query("DELETE FROM bids WHERE id = $1")
        .bind(bid_id)
        .execute(&state.db)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Err(ApiError::not_found("Bid not found"));
    }

    tracing::info!(user_id = %admin.user_id(), bid_id = %bid_id, "Bid deleted");
    changed(&state, bid_event(ChangeOp::Delete, bid_id)).await;

    Ok(MessageResponse::new("Bid deleted"))
}

/// PUT /bids/:id/status
pub async fn set_status(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(bid_id): Path<Uuid>,
    Json(req): Json<SetStatusRequest>,
) -> ApiResult<DataResponse<BidResponse>> {
    let status = BidStatus::parse(&req.status)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown status: {}", req.status)))?;

    let mut tx = state.db.begin().await?;
    let current = lock_bid(&mut *tx, bid_id).await?;

    let mut next = current.clone();
    if !lifecycle::change_status(&mut next, status, Utc::now()) {
        tx.rollback().await?;
        return Ok(DataResponse::new(BidResponse::from_bid(
            current,
            &state.urgency_context(),
        )));
    }

    let bid = sqlx::query_as::<_, Bid>(&format!(
        r#"
        UPDATE bids SET
            status = $2, bid_sent_at = $3, won_at = $4, lost_at = $5, updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        BID_COLUMNS
    ))
    .bind(bid_id)
    .bind(next.status)
    .bind(next.bid_sent_at)
    .bind(next.won_at)
    .bind(next.lost_at)
    .fetch_one(&mut *tx)
    .await?;

    timeline::record(
        &mut *tx,
        bid_id,
        auth.user_id,
        TimelineEventType::StatusChanged,
        &format!(
            "Status changed from {} to {}",
            current.status.label(),
            status.label()
        ),
        Some(json!({ "from": current.status, "to": status })),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        user_id = %auth.user_id,
        bid_id = %bid_id,
        from = %current.status,
        to = %status,
        "Bid status changed"
    );
    changed(&state, bid_event(ChangeOp::Update, bid_id)).await;

    Ok(DataResponse::new(BidResponse::from_bid(
        bid,
        &state.urgency_context(),
    )))
}

/// Moves a bid between views. A placement that leaves the bid in the view
/// it is already in is a no-op.
async fn apply_placement(
    state: &AppState,
    user_id: Uuid,
    bid_id: Uuid,
    placement: Placement,
) -> ApiResult<DataResponse<BidResponse>> {
    let mut tx = state.db.begin().await?;
    let current = lock_bid(&mut *tx, bid_id).await?;

    let mut next = current.clone();
    if !lifecycle::place(&mut next, placement, Utc::now())? {
        tx.rollback().await?;
        return Ok(DataResponse::new(BidResponse::from_bid(
            current,
            &state.urgency_context(),
        )));
    }

    let bid = sqlx::query_as::<_, Bid>(&format!(
        "UPDATE bids SET {}, updated_at = NOW() WHERE id = $1 RETURNING {}",
        placement.sql_assignments(),
        BID_COLUMNS
    ))
    .bind(bid_id)
    .fetch_one(&mut *tx)
    .await?;

    timeline::record(
        &mut *tx,
        bid_id,
        user_id,
        placement.event_type(),
        placement.describe(),
        Some(json!({ "from": current.view(), "to": bid.view() })),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        user_id = %user_id,
        bid_id = %bid_id,
        placement = ?placement,
        view = %bid.view(),
        "Bid placement changed"
    );
    changed(state, bid_event(ChangeOp::Update, bid_id)).await;

    Ok(DataResponse::new(BidResponse::from_bid(
        bid,
        &state.urgency_context(),
    )))
}

macro_rules! placement_handler {
    ($(#[$doc:meta])* $name:ident, $placement:expr) => {
        $(#[$doc])*
        pub async fn $name(
            auth: RequireAuth,
            State(state): State<Arc<AppState>>,
            Path(bid_id): Path<Uuid>,
        ) -> ApiResult<DataResponse<BidResponse>> {
            apply_placement(&state, auth.user_id, bid_id, $placement).await
        }
    };
}

placement_handler!(
    /// POST /bids/:id/hold
    hold_bid,
    Placement::Hold
);
placement_handler!(
    /// POST /bids/:id/resume
    resume_bid,
    Placement::Resume
);
placement_handler!(
    /// POST /bids/:id/archive
    archive_bid,
    Placement::Archive
);
placement_handler!(
    /// POST /bids/:id/unarchive
    unarchive_bid,
    Placement::Unarchive
);
placement_handler!(
    /// POST /bids/:id/apm/return
    return_to_estimating,
    Placement::ReturnToEstimating
);
placement_handler!(
    /// POST /bids/:id/apm/hold
    apm_hold,
    Placement::ApmHold
);
placement_handler!(
    /// POST /bids/:id/apm/resume
    apm_resume,
    Placement::ApmResume
);
placement_handler!(
    /// POST /bids/:id/apm/archive
    apm_archive,
    Placement::ApmArchive
);
placement_handler!(
    /// POST /bids/:id/apm/unarchive
    apm_unarchive,
    Placement::ApmUnarchive
);

/// POST /bids/:id/apm/send
///
/// Hand a won bid to the APM team. Sending a bid that is already in APM
/// returns it unchanged.
pub async fn send_to_apm(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(bid_id): Path<Uuid>,
    body: Option<Json<SendToApmRequest>>,
) -> ApiResult<DataResponse<BidResponse>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();

    let mut tx = state.db.begin().await?;
    let current = lock_bid(&mut *tx, bid_id).await?;

    let mut next = current.clone();
    if !lifecycle::send_to_apm(&mut next, req.apm_assigned_to, Utc::now())? {
        tx.rollback().await?;
        return Ok(DataResponse::new(BidResponse::from_bid(
            current,
            &state.urgency_context(),
        )));
    }

    let bid = sqlx::query_as::<_, Bid>(&format!(
        r#"
        UPDATE bids SET
            sent_to_apm = TRUE,
            sent_to_apm_at = $2,
            apm_assigned_to = $3,
            apm_on_hold = FALSE,
            apm_on_hold_at = NULL,
            apm_archived = FALSE,
            apm_archived_at = NULL,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        BID_COLUMNS
    ))
    .bind(bid_id)
    .bind(next.sent_to_apm_at)
    .bind(next.apm_assigned_to)
    .fetch_one(&mut *tx)
    .await?;

    timeline::record(
        &mut *tx,
        bid_id,
        auth.user_id,
        TimelineEventType::SentToApm,
        "Sent to APM",
        Some(json!({ "apm_assigned_to": bid.apm_assigned_to })),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(user_id = %auth.user_id, bid_id = %bid_id, "Bid sent to APM");
    changed(&state, bid_event(ChangeOp::Update, bid_id)).await;

    Ok(DataResponse::new(BidResponse::from_bid(
        bid,
        &state.urgency_context(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn money_outside_the_column_is_rejected() {
        assert!(validate_money("estimated_value", None).is_ok());
        assert!(validate_money("estimated_value", Some(999_999_999_999)).is_ok());

        let err = validate_money("estimated_value", Some(1_000_000_000_000)).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = validate_money("estimated_value", Some(-1)).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
