//! APM phase routes
//!
//! Procurement and closeout tracking per vendor once a bid is in APM.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::bid_vendors::{fetch_line, lines_for_bid};
use super::bids::fetch_bid;
use super::changed;
use crate::api::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::apm::{phase_grid, ApmPhase, ApmPhaseRow, UpsertPhaseRequest, VendorPhases};
use crate::domain::patch::split;
use crate::domain::timeline::TimelineEventType;
use crate::error::{ApiError, ApiResult};
use crate::services::{timeline, ChangeEvent, ChangeOp, Table};

const PHASE_COLUMNS: &str =
    "bid_vendor_id, phase, status, requested_at, received_at, follow_up_date, notes, updated_at";

/// GET /bids/:id/apm/phases
///
/// Every phase for every vendor on the bid; phases never touched read as
/// `pending`.
pub async fn list_phases(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(bid_id): Path<Uuid>,
) -> ApiResult<DataResponse<Vec<VendorPhases>>> {
    fetch_bid(&state.db, bid_id).await?;

    let lines = lines_for_bid(&state.db, bid_id).await?;
    let rows = sqlx::query_as::<_, ApmPhaseRow>(
        r#"
        SELECT p.bid_vendor_id, p.phase, p.status, p.requested_at, p.received_at,
               p.follow_up_date, p.notes, p.updated_at
        FROM apm_phases p
        JOIN bid_vendors bv ON bv.id = p.bid_vendor_id
        WHERE bv.bid_id = $1
        "#,
    )
    .bind(bid_id)
    .fetch_all(&state.db)
    .await?;

    let ctx = state.urgency_context();
    let grid = lines
        .into_iter()
        .map(|line| phase_grid(line.id, line.vendor_id, line.company_name, &rows, &ctx))
        .collect();

    Ok(DataResponse::new(grid))
}

/// PUT /bids/:id/vendors/:bid_vendor_id/phases/:phase
pub async fn upsert_phase(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((bid_id, bid_vendor_id, phase)): Path<(Uuid, Uuid, String)>,
    Json(req): Json<UpsertPhaseRequest>,
) -> ApiResult<DataResponse<VendorPhases>> {
    let phase = ApmPhase::parse(&phase)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown APM phase: {}", phase)))?;

    let bid = fetch_bid(&state.db, bid_id).await?;
    if !bid.sent_to_apm {
        return Err(ApiError::conflict("Bid has not been sent to APM"));
    }

    let (set_follow_up, follow_up_date) = split(&req.follow_up_date);

    let mut tx = state.db.begin().await?;
    let line = fetch_line(&mut *tx, bid_id, bid_vendor_id).await?;

    sqlx::query(
        r#"
        INSERT INTO apm_phases (bid_vendor_id, phase, status, requested_at, received_at,
                                follow_up_date, notes)
        VALUES ($1, $2, $3,
                CASE WHEN $3 = 'requested' THEN NOW() END,
                CASE WHEN $3 IN ('received', 'approved') THEN NOW() END,
                $5, $6)
        ON CONFLICT (bid_vendor_id, phase) DO UPDATE SET
            status = EXCLUDED.status,
            requested_at = CASE WHEN EXCLUDED.status = 'requested'
                THEN COALESCE(apm_phases.requested_at, NOW()) ELSE apm_phases.requested_at END,
            received_at = CASE WHEN EXCLUDED.status IN ('received', 'approved')
                THEN COALESCE(apm_phases.received_at, NOW()) ELSE apm_phases.received_at END,
            follow_up_date = CASE WHEN $4 THEN EXCLUDED.follow_up_date
                ELSE apm_phases.follow_up_date END,
            notes = COALESCE(EXCLUDED.notes, apm_phases.notes),
            updated_at = NOW()
        "#,
    )
    .bind(bid_vendor_id)
    .bind(phase)
    .bind(req.status)
    .bind(set_follow_up)
    .bind(follow_up_date)
    .bind(&req.notes)
    .execute(&mut *tx)
    .await?;

    timeline::record(
        &mut *tx,
        bid_id,
        auth.user_id,
        TimelineEventType::ApmPhaseUpdated,
        &format!(
            "{}: {} {}",
            line.company_name,
            phase.label(),
            req.status.label().to_lowercase()
        ),
        Some(json!({
            "vendor_id": line.vendor_id,
            "phase": phase,
            "status": req.status,
            "follow_up_date": follow_up_date,
        })),
    )
    .await?;

    let rows = sqlx::query_as::<_, ApmPhaseRow>(&format!(
        "SELECT {} FROM apm_phases WHERE bid_vendor_id = $1",
        PHASE_COLUMNS
    ))
    .bind(bid_vendor_id)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        user_id = %auth.user_id,
        bid_id = %bid_id,
        bid_vendor_id = %bid_vendor_id,
        phase = phase.as_str(),
        status = ?req.status,
        "APM phase updated"
    );
    changed(
        &state,
        ChangeEvent::new(Table::ApmPhases, ChangeOp::Update, bid_vendor_id).for_bid(bid_id),
    )
    .await;

    Ok(DataResponse::new(phase_grid(
        line.id,
        line.vendor_id,
        line.company_name,
        &rows,
        &state.urgency_context(),
    )))
}
