//! Vendor directory routes

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::changed;
use crate::api::{Created, DataResponse, MessageResponse, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::{RequireAdmin, RequireAuth};
use crate::domain::vendors::{
    CreateVendorRequest, UpdateVendorRequest, Vendor, VendorQuery, VENDOR_COLUMNS,
};
use crate::domain::patch::split;
use crate::error::{ApiError, ApiResult};
use crate::services::{ChangeEvent, ChangeOp, Table};

/// GET /vendors
pub async fn list_vendors(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(query): Query<VendorQuery>,
) -> ApiResult<Paginated<Vendor>> {
    let vendors = sqlx::query_as::<_, Vendor>(&format!(
        "SELECT {} FROM vendors ORDER BY LOWER(company_name), id",
        VENDOR_COLUMNS
    ))
    .fetch_all(&state.db)
    .await?;

    let params = PaginationParams::new(query.page, query.per_page);
    let matching: Vec<Vendor> = vendors.into_iter().filter(|v| v.matches(&query)).collect();
    Ok(Paginated::from_items(matching, &params))
}

/// POST /vendors
pub async fn create_vendor(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateVendorRequest>,
) -> ApiResult<Created<Vendor>> {
    let req = req.normalized();
    req.validate()?;

    let vendor = sqlx::query_as::<_, Vendor>(&format!(
        r#"
        INSERT INTO vendors (company_name, specialty, contact_person, email, phone, address, notes, is_priority)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {}
        "#,
        VENDOR_COLUMNS
    ))
    .bind(&req.company_name)
    .bind(&req.specialty)
    .bind(&req.contact_person)
    .bind(&req.email)
    .bind(&req.phone)
    .bind(&req.address)
    .bind(&req.notes)
    .bind(req.is_priority)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(user_id = %auth.user_id, vendor_id = %vendor.id, "Vendor created");
    changed(
        &state,
        ChangeEvent::new(Table::Vendors, ChangeOp::Insert, vendor.id),
    )
    .await;

    Ok(Created(vendor))
}

/// GET /vendors/:id
pub async fn get_vendor(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(vendor_id): Path<Uuid>,
) -> ApiResult<DataResponse<Vendor>> {
    let vendor = sqlx::query_as::<_, Vendor>(&format!(
        "SELECT {} FROM vendors WHERE id = $1",
        VENDOR_COLUMNS
    ))
    .bind(vendor_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Vendor not found"))?;

    Ok(DataResponse::new(vendor))
}

/// PATCH /vendors/:id
pub async fn update_vendor(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(vendor_id): Path<Uuid>,
    Json(req): Json<UpdateVendorRequest>,
) -> ApiResult<DataResponse<Vendor>> {
    let req = req.normalized();
    req.validate()?;

    let (set_specialty, specialty) = split(&req.specialty);
    let (set_contact, contact_person) = split(&req.contact_person);
    let (set_email, email) = split(&req.email);
    let (set_phone, phone) = split(&req.phone);
    let (set_address, address) = split(&req.address);
    let (set_notes, notes) = split(&req.notes);

    let vendor = sqlx::query_as::<_, Vendor>(&format!(
        r#"
        UPDATE vendors SET
            company_name = COALESCE($2, company_name),
            specialty = CASE WHEN $3 THEN $4 ELSE specialty END,
            contact_person = CASE WHEN $5 THEN $6 ELSE contact_person END,
            email = CASE WHEN $7 THEN $8 ELSE email END,
            phone = CASE WHEN $9 THEN $10 ELSE phone END,
            address = CASE WHEN $11 THEN $12 ELSE address END,
            notes = CASE WHEN $13 THEN $14 ELSE notes END,
            is_priority = COALESCE($15, is_priority),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        VENDOR_COLUMNS
    ))
    .bind(vendor_id)
    .bind(&req.company_name)
    .bind(set_specialty)
    .bind(specialty)
    .bind(set_contact)
    .bind(contact_person)
    .bind(set_email)
    .bind(email)
    .bind(set_phone)
    .bind(phone)
    .bind(set_address)
    .bind(address)
    .bind(set_notes)
    .bind(notes)
    .bind(req.is_priority)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Vendor not found"))?;

    tracing::info!(user_id = %auth.user_id, vendor_id = %vendor.id, "Vendor updated");
    changed(
        &state,
        ChangeEvent::new(Table::Vendors, ChangeOp::Update, vendor.id),
    )
    .await;

    Ok(DataResponse::new(vendor))
}

/// DELETE /vendors/:id
///
/// Also removes the vendor from every bid it was invited to.
pub async fn delete_vendor(
    admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(vendor_id): Path<Uuid>,
) -> ApiResult<MessageResponse> {
    let deleted = sqlx::query("DELETE FROM vendors WHERE id = $1")
        .bind(vendor_id)
        .execute(&state.db)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Err(ApiError::not_found("Vendor not found"));
    }

    tracing::info!(user_id = %admin.user_id(), vendor_id = %vendor_id, "Vendor deleted");
    changed(
        &state,
        ChangeEvent::new(Table::Vendors, ChangeOp::Delete, vendor_id),
    )
    .await;

    Ok(MessageResponse::new("Vendor deleted"))
}
