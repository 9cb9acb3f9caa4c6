//! Equipment routes

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
use crate::domain::equipment::{
    validate_equipment, CreateEquipmentRequest, Equipment, UpdateEquipmentRequest,
    EQUIPMENT_COLUMNS,
};
use crate::domain::patch::split;
use crate::domain::timeline::TimelineEventType;
use crate::error::{ApiError, ApiResult};
use crate::services::{timeline, ChangeEvent, ChangeOp, Table};

// Anything past `pending` has been ordered; `received` also stamps receipt.
const STAMP_ORDERED: &str =
    "CASE WHEN status IN ('ordered', 'shipped', 'received') THEN COALESCE(ordered_at, NOW()) ELSE ordered_at END";
const STAMP_RECEIVED: &str =
    "CASE WHEN status = 'received' THEN COALESCE(received_at, NOW()) ELSE received_at END";

fn equipment_event(op: ChangeOp, bid_id: Uuid, id: Uuid) -> ChangeEvent {
    ChangeEvent::new(Table::Equipment, op, id).for_bid(bid_id)
}

/// GET /bids/:id/equipment
pub async fn list_equipment(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(bid_id): Path<Uuid>,
) -> ApiResult<DataResponse<Vec<Equipment>>> {
    ensure_bid(&state, bid_id).await?;

    let items = sqlx::query_as::<_, Equipment>(&format!(
        "SELECT {} FROM equipment WHERE bid_id = $1 ORDER BY created_at, id",
        EQUIPMENT_COLUMNS
    ))
    .bind(bid_id)
    .fetch_all(&state.db)
    .await?;

    Ok(DataResponse::new(items))
}

/// POST /bids/:id/equipment
pub async fn add_equipment(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(bid_id): Path<Uuid>,
    Json(req): Json<CreateEquipmentRequest>,
) -> ApiResult<Created<Equipment>> {
    validate_equipment(Some(&req.description), Some(req.quantity)).map_err(ApiError::BadRequest)?;
    ensure_bid(&state, bid_id).await?;

    let mut tx = state.db.begin().await?;

    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO equipment (bid_id, vendor_id, description, model_number, quantity, status,
                               expected_date, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(bid_id)
    .bind(req.vendor_id)
    .bind(req.description.trim())
    .bind(&req.model_number)
    .bind(req.quantity)
    .bind(req.status)
    .bind(req.expected_date)
    .bind(&req.notes)
    .fetch_one(&mut *tx)
    .await?;

    let item = sqlx::query_as::<_, Equipment>(&format!(
        "UPDATE equipment SET ordered_at = {}, received_at = {} WHERE id = $1 RETURNING {}",
        STAMP_ORDERED, STAMP_RECEIVED, EQUIPMENT_COLUMNS
    ))
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    timeline::record(
        &mut *tx,
        bid_id,
        auth.user_id,
        TimelineEventType::EquipmentUpdated,
        &format!("Added equipment: {} x{}", item.description, item.quantity),
        Some(json!({ "equipment_id": item.id, "status": item.status })),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(user_id = %auth.user_id, bid_id = %bid_id, equipment_id = %item.id, "Equipment added");
    changed(&state, equipment_event(ChangeOp::Insert, bid_id, item.id)).await;

    Ok(Created(item))
}

/// PATCH /bids/:id/equipment/:equipment_id
pub async fn update_equipment(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((bid_id, equipment_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateEquipmentRequest>,
) -> ApiResult<DataResponse<Equipment>> {
    validate_equipment(req.description.as_deref(), req.quantity).map_err(ApiError::BadRequest)?;

    let (set_vendor, vendor_id) = split(&req.vendor_id);
    let (set_model, model_number) = split(&req.model_number);
    let (set_expected, expected_date) = split(&req.expected_date);
    let (set_notes, notes) = split(&req.notes);

    let mut tx = state.db.begin().await?;

    let updated: Option<Uuid> = sqlx::query_scalar(
        r#"
        UPDATE equipment SET
            description = COALESCE($3, description),
            vendor_id = CASE WHEN $4 THEN $5 ELSE vendor_id END,
            model_number = CASE WHEN $6 THEN $7 ELSE model_number END,
            quantity = COALESCE($8, quantity),
            status = COALESCE($9, status),
            expected_date = CASE WHEN $10 THEN $11 ELSE expected_date END,
            notes = CASE WHEN $12 THEN $13 ELSE notes END,
            updated_at = NOW()
        WHERE id = $1 AND bid_id = $2
        RETURNING id
        "#,
    )
    .bind(equipment_id)
    .bind(bid_id)
    .bind(req.description.as_deref().map(str::trim))
    .bind(set_vendor)
    .bind(vendor_id)
    .bind(set_model)
    .bind(model_number)
    .bind(req.quantity)
    .bind(req.status)
    .bind(set_expected)
    .bind(expected_date)
    .bind(set_notes)
    .bind(notes)
    .fetch_optional(&mut *tx)
    .await?;

    if updated.is_none() {
        return Err(ApiError::not_found("Equipment not found"));
    }

    let item = sqlx::query_as::<_, Equipment>(&format!(
        "UPDATE equipment SET ordered_at = {}, received_at = {} WHERE id = $1 RETURNING {}",
        STAMP_ORDERED, STAMP_RECEIVED, EQUIPMENT_COLUMNS
    ))
    .bind(equipment_id)
    .fetch_one(&mut *tx)
    .await?;

    timeline::record(
        &mut *tx,
        bid_id,
        auth.user_id,
        TimelineEventType::EquipmentUpdated,
        &format!("Updated equipment: {}", item.description),
        Some(json!({ "equipment_id": item.id, "status": item.status })),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(user_id = %auth.user_id, bid_id = %bid_id, equipment_id = %item.id, "Equipment updated");
    changed(&state, equipment_event(ChangeOp::Update, bid_id, item.id)).await;

    Ok(DataResponse::new(item))
}

/// DELETE /bids/:id/equipment/:equipment_id
pub async fn delete_equipment(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((bid_id, equipment_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<MessageResponse> {
    let mut tx = state.db.begin().await?;

    let description: String = sqlx::query_scalar(
        "DELETE FROM equipment WHERE id = $1 AND bid_id = $2 RETURNING description",
    )
    .bind(equipment_id)
    .bind(bid_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Equipment not found"))?;

    timeline::record(
        &mut *tx,
        bid_id,
        auth.user_id,
        TimelineEventType::EquipmentUpdated,
        &format!("Removed equipment: {}", description),
        Some(json!({ "equipment_id": equipment_id })),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(user_id = %auth.user_id, bid_id = %bid_id, equipment_id = %equipment_id, "Equipment removed");
    changed(&state, equipment_event(ChangeOp::Delete, bid_id, equipment_id)).await;

    Ok(MessageResponse::new("Equipment removed"))
}
