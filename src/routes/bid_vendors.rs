//! Vendor outreach routes
//!
//! Inviting vendors to price a bid and recording their responses and costs.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;
use sqlx::PgExecutor;
use std::sync::Arc;
use uuid::Uuid;

use super::bids::ensure_bid;
use super::changed;
use crate::api::{Created, DataResponse, MessageResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::bid_vendors::{
    AddBidVendorsRequest, BidVendorResponse, BidVendorRow, ResponseStatus,
    UpdateBidVendorRequest, BID_VENDOR_SELECT,
};
use crate::domain::money::{cents_to_decimal, check_cents, format_cents};
use crate::domain::patch::split;
use crate::domain::timeline::TimelineEventType;
use crate::error::{ApiError, ApiResult};
use crate::services::{timeline, ChangeEvent, ChangeOp, Table};

/// Load one vendor line of a bid or 404
pub(crate) async fn fetch_line<'e>(
    executor: impl PgExecutor<'e>,
    bid_id: Uuid,
    bid_vendor_id: Uuid,
) -> ApiResult<BidVendorRow> {
    sqlx::query_as::<_, BidVendorRow>(&format!(
        "{} WHERE bv.id = $1 AND bv.bid_id = $2",
        BID_VENDOR_SELECT
    ))
    .bind(bid_vendor_id)
    .bind(bid_id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| ApiError::not_found("Vendor is not on this bid"))
}

pub(crate) async fn lines_for_bid<'e>(
    executor: impl PgExecutor<'e>,
    bid_id: Uuid,
) -> Result<Vec<BidVendorRow>, sqlx::Error> {
    sqlx::query_as::<_, BidVendorRow>(&format!(
        "{} WHERE bv.bid_id = $1 ORDER BY bv.is_priority DESC, LOWER(v.company_name), bv.id",
        BID_VENDOR_SELECT
    ))
    .bind(bid_id)
    .fetch_all(executor)
    .await
}

fn line_event(op: ChangeOp, bid_id: Uuid, bid_vendor_id: Uuid) -> ChangeEvent {
    ChangeEvent::new(Table::BidVendors, op, bid_vendor_id).for_bid(bid_id)
}

/// GET /bids/:id/vendors
pub async fn list_bid_vendors(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(bid_id): Path<Uuid>,
) -> ApiResult<DataResponse<Vec<BidVendorResponse>>> {
    ensure_bid(&state, bid_id).await?;

    let ctx = state.urgency_context();
    let lines = lines_for_bid(&state.db, bid_id)
        .await?
        .into_iter()
        .map(|row| BidVendorResponse::from_row(row, &ctx))
        .collect();

    Ok(DataResponse::new(lines))
}

/// POST /bids/:id/vendors
///
/// Invites one or more vendors. The whole request fails if any vendor is
/// already on the bid.
pub async fn add_bid_vendors(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(bid_id): Path<Uuid>,
    Json(req): Json<AddBidVendorsRequest>,
) -> ApiResult<Created<Vec<BidVendorResponse>>> {
    let mut vendor_ids = req.vendor_ids.clone();
    vendor_ids.sort();
    vendor_ids.dedup();
    if vendor_ids.is_empty() {
        return Err(ApiError::bad_request("vendor_ids must not be empty"));
    }

    ensure_bid(&state, bid_id).await?;

    let mut tx = state.db.begin().await?;

    let existing: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT v.company_name
        FROM bid_vendors bv JOIN vendors v ON v.id = bv.vendor_id
        WHERE bv.bid_id = $1 AND bv.vendor_id = ANY($2)
        ORDER BY v.company_name
        "#,
    )
    .bind(bid_id)
    .bind(&vendor_ids)
    .fetch_all(&mut *tx)
    .await?;

    if !existing.is_empty() {
        return Err(ApiError::conflict(format!(
            "Already on this bid: {}",
            existing.join(", ")
        )));
    }

    let mut ids = Vec::with_capacity(vendor_ids.len());
    for vendor_id in &vendor_ids {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO bid_vendors (bid_id, vendor_id, due_date, is_priority)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(bid_id)
        .bind(vendor_id)
        .bind(req.due_date)
        .bind(req.is_priority)
        .fetch_one(&mut *tx)
        .await?;
        ids.push(id);
    }

    let rows = sqlx::query_as::<_, BidVendorRow>(&format!(
        "{} WHERE bv.id = ANY($1) ORDER BY LOWER(v.company_name)",
        BID_VENDOR_SELECT
    ))
    .bind(&ids)
    .fetch_all(&mut *tx)
    .await?;

    for row in &rows {
        timeline::record(
            &mut *tx,
            bid_id,
            auth.user_id,
            TimelineEventType::VendorAdded,
            &format!("Requested pricing from {}", row.company_name),
            Some(json!({ "vendor_id": row.vendor_id, "due_date": row.due_date })),
        )
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        user_id = %auth.user_id,
        bid_id = %bid_id,
        vendors = rows.len(),
        "Vendors added to bid"
    );
    for row in &rows {
        changed(&state, line_event(ChangeOp::Insert, bid_id, row.id)).await;
    }

    let ctx = state.urgency_context();
    Ok(Created(
        rows.into_iter()
            .map(|row| BidVendorResponse::from_row(row, &ctx))
            .collect(),
    ))
}

/// PATCH /bids/:id/vendors/:bid_vendor_id
///
/// Records a response and/or a cost. A cost on a pending request marks the
/// vendor as quoting.
pub async fn update_bid_vendor(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((bid_id, bid_vendor_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateBidVendorRequest>,
) -> ApiResult<DataResponse<BidVendorResponse>> {
    if let Some(cents) = req.cost_amount {
        check_cents("cost_amount", cents).map_err(ApiError::bad_request)?;
    }
    let (set_due, due_date) = split(&req.due_date);
    let (set_notes, notes) = split(&req.notes);

    let mut tx = state.db.begin().await?;

    let current: ResponseStatus = sqlx::query_scalar(
        "SELECT response_status FROM bid_vendors WHERE id = $1 AND bid_id = $2 FOR UPDATE",
    )
    .bind(bid_vendor_id)
    .bind(bid_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Vendor is not on this bid"))?;

    let status = req.effective_status(current);

    sqlx::query(
        r#"
        UPDATE bid_vendors SET
            response_status = $3,
            responded_at = CASE
                WHEN $3 = 'pending' THEN NULL
                WHEN response_status <> $3 THEN NOW()
                ELSE responded_at
            END,
            due_date = CASE WHEN $4 THEN $5 ELSE due_date END,
            cost_amount = COALESCE($6, cost_amount),
            cost_received_at = CASE WHEN $6 IS NOT NULL THEN NOW() ELSE cost_received_at END,
            is_priority = COALESCE($7, is_priority),
            notes = CASE WHEN $8 THEN $9 ELSE notes END,
            updated_at = NOW()
        WHERE id = $1 AND bid_id = $2
        "#,
    )
    .bind(bid_vendor_id)
    .bind(bid_id)
    .bind(status)
    .bind(set_due)
    .bind(due_date)
    .bind(req.cost_amount.map(cents_to_decimal))
    .bind(req.is_priority)
    .bind(set_notes)
    .bind(notes)
    .execute(&mut *tx)
    .await?;

    let row = fetch_line(&mut *tx, bid_id, bid_vendor_id).await?;

    if status != current {
        timeline::record(
            &mut *tx,
            bid_id,
            auth.user_id,
            TimelineEventType::VendorResponse,
            &format!("{} responded: {}", row.company_name, status.label()),
            Some(json!({ "vendor_id": row.vendor_id, "from": current, "to": status })),
        )
        .await?;
    }
    if let Some(cents) = req.cost_amount {
        timeline::record(
            &mut *tx,
            bid_id,
            auth.user_id,
            TimelineEventType::CostReceived,
            &format!("{} cost received: {}", row.company_name, format_cents(cents)),
            Some(json!({ "vendor_id": row.vendor_id, "cost_amount": cents })),
        )
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        user_id = %auth.user_id,
        bid_id = %bid_id,
        bid_vendor_id = %bid_vendor_id,
        response = ?status,
        "Vendor response updated"
    );
    changed(&state, line_event(ChangeOp::Update, bid_id, bid_vendor_id)).await;

    Ok(DataResponse::new(BidVendorResponse::from_row(
        row,
        &state.urgency_context(),
    )))
}

/// DELETE /bids/:id/vendors/:bid_vendor_id
pub async fn remove_bid_vendor(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((bid_id, bid_vendor_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<MessageResponse> {
    let mut tx = state.db.begin().await?;

    let row = fetch_line(&mut *tx, bid_id, bid_vendor_id).await?;

    sqlx::query("DELETE FROM bid_vendors WHERE id = $1")
        .bind(bid_vendor_id)
        .execute(&mut *tx)
        .await?;

    timeline::record(
        &mut *tx,
        bid_id,
        auth.user_id,
        TimelineEventType::VendorRemoved,
        &format!("Removed {}", row.company_name),
        Some(json!({ "vendor_id": row.vendor_id })),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        user_id = %auth.user_id,
        bid_id = %bid_id,
        vendor_id = %row.vendor_id,
        "Vendor removed from bid"
    );
    changed(&state, line_event(ChangeOp::Delete, bid_id, bid_vendor_id)).await;

    Ok(MessageResponse::new("Vendor removed from bid"))
}
