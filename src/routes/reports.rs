//! Report routes
//!
//! JSON reports over the board, plus delivery of any of them by email.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use super::bid_vendors::lines_for_bid;
use super::bids::{fetch_bid, load_view};
use crate::api::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::{BidResponse, BoardView};
use crate::error::{ApiError, ApiResult};
use crate::middleware::RequestId;
use crate::services::email::{normalize_recipients, DeliveryReceipt};
use crate::services::reports::{
    build_due_soon, build_pipeline, build_vendor_costs, DueSoonReport, PendingVendorRequest,
    PipelineReport, RenderReport, VendorCostReport,
};

const DEFAULT_HORIZON_DAYS: u32 = 5;
const MAX_HORIZON_DAYS: u32 = 60;

#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    #[serde(default)]
    pub view: Option<String>,
}

impl ViewQuery {
    /// Accepts the same spellings as the board listing; defaults to Active
    pub fn view(&self) -> ApiResult<BoardView> {
        parse_view(self.view.as_deref())
    }
}

fn parse_view(raw: Option<&str>) -> ApiResult<BoardView> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(BoardView::Active),
        Some(v) => BoardView::parse(v)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown view: {}", v))),
    }
}

#[derive(Debug, Deserialize)]
pub struct DueSoonQuery {
    #[serde(default)]
    pub days: Option<u32>,
}

fn horizon(days: Option<u32>) -> ApiResult<u32> {
    match days.unwrap_or(DEFAULT_HORIZON_DAYS) {
        n @ 1..=MAX_HORIZON_DAYS => Ok(n),
        n => Err(ApiError::bad_request(format!(
            "days must be between 1 and {}, got {}",
            MAX_HORIZON_DAYS, n
        ))),
    }
}

/// Outstanding vendor requests on bids in a view. A request without its own
/// due date inherits the bid's.
pub(crate) async fn pending_requests(
    db: &PgPool,
    view: BoardView,
) -> Result<Vec<PendingVendorRequest>, sqlx::Error> {
    sqlx::query_as::<_, PendingVendorRequest>(&format!(
        r#"
        SELECT b.id AS bid_id, b.project_name, v.id AS vendor_id, v.company_name,
               COALESCE(bv.due_date, b.due_date) AS due_date
        FROM bid_vendors bv
        JOIN vendors v ON v.id = bv.vendor_id
        JOIN bids b ON b.id = bv.bid_id
        WHERE bv.response_status = 'pending'
          AND b.id IN (SELECT id FROM bids WHERE {})
        "#,
        view.sql_predicate()
    ))
    .fetch_all(db)
    .await
}

async fn pipeline_report(state: &AppState, view: BoardView) -> ApiResult<PipelineReport> {
    let ctx = state.urgency_context();
    let bids = load_view(&state.db, view, &ctx).await?;
    Ok(build_pipeline(view, &bids, ctx.today))
}

async fn due_soon_report(state: &AppState, days: u32) -> ApiResult<DueSoonReport> {
    let ctx = state.urgency_context();
    let bids = load_view(&state.db, BoardView::Active, &ctx).await?;
    let pending = pending_requests(&state.db, BoardView::Active).await?;
    Ok(build_due_soon(&bids, &pending, &ctx, days))
}

async fn vendor_cost_report(state: &AppState, bid_id: Uuid) -> ApiResult<VendorCostReport> {
    let bid = fetch_bid(&state.db, bid_id).await?;
    let bid = BidResponse::from_bid(bid, &state.urgency_context());
    let rows = lines_for_bid(&state.db, bid_id).await?;
    Ok(build_vendor_costs(&bid, rows))
}

/// GET /reports/pipeline
pub async fn pipeline(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ViewQuery>,
) -> ApiResult<DataResponse<PipelineReport>> {
    let report = pipeline_report(&state, query.view()?).await?;
    Ok(DataResponse::new(report))
}

/// GET /reports/due-soon
///
/// Active estimating bids due within `days` business days.
pub async fn due_soon(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(query): Query<DueSoonQuery>,
) -> ApiResult<DataResponse<DueSoonReport>> {
    let report = due_soon_report(&state, horizon(query.days)?).await?;
    Ok(DataResponse::new(report))
}

/// GET /bids/:id/reports/vendor-costs
pub async fn vendor_costs(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(bid_id): Path<Uuid>,
) -> ApiResult<DataResponse<VendorCostReport>> {
    let report = vendor_cost_report(&state, bid_id).await?;
    Ok(DataResponse::new(report))
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Pipeline,
    DueSoon,
    VendorCosts,
}

#[derive(Debug, Deserialize)]
pub struct EmailReportRequest {
    pub report: ReportKind,
    #[serde(default)]
    pub view: Option<String>,
    #[serde(default)]
    pub days: Option<u32>,
    #[serde(default)]
    pub bid_id: Option<Uuid>,
    pub recipients: Vec<String>,
    #[serde(default)]
    pub subject: Option<String>,
}

/// Wrap a rendered fragment into a complete message body
fn email_body(report: &dyn RenderReport) -> (String, String) {
    let title = report.title();
    let html = format!(
        "<!DOCTYPE html>\n<html><body style=\"font-family: sans-serif\">\n{}</body></html>\n",
        report.to_html()
    );
    (title, html)
}

/// POST /reports/email
pub async fn email_report(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    Json(req): Json<EmailReportRequest>,
) -> ApiResult<DataResponse<DeliveryReceipt>> {
    if !state.email.is_configured() {
        return Err(ApiError::unavailable("Email delivery is not configured"));
    }
    let recipients = normalize_recipients(&req.recipients)?;

    let (title, html) = match req.report {
        ReportKind::Pipeline => {
            email_body(&pipeline_report(&state, parse_view(req.view.as_deref())?).await?)
        }
        ReportKind::DueSoon => email_body(&due_soon_report(&state, horizon(req.days)?).await?),
        ReportKind::VendorCosts => {
            let bid_id = req
                .bid_id
                .ok_or_else(|| ApiError::bad_request("bid_id is required for vendor_costs"))?;
            email_body(&vendor_cost_report(&state, bid_id).await?)
        }
    };

    let subject = req
        .subject
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .unwrap_or(title);

    let receipt = state
        .email
        .send(&recipients, &subject, &html, request_id.as_deref())
        .await?;

    tracing::info!(
        user_id = %auth.user_id,
        report = ?req.report,
        recipients = receipt.recipients,
        "Report emailed"
    );

    Ok(DataResponse::new(receipt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizon_defaults_and_bounds() {
        assert_eq!(horizon(None).unwrap(), 5);
        assert_eq!(horizon(Some(10)).unwrap(), 10);
        assert!(horizon(Some(0)).is_err());
        assert!(horizon(Some(61)).is_err());
    }

    #[test]
    fn views_parse_like_the_board_listing() {
        assert_eq!(parse_view(None).unwrap(), BoardView::Active);
        assert_eq!(parse_view(Some("")).unwrap(), BoardView::Active);
        assert_eq!(parse_view(Some("apm-on-hold")).unwrap(), BoardView::ApmOnHold);
        assert!(parse_view(Some("trash")).is_err());
    }

    #[test]
    fn email_request_parses_report_kind() {
        let req: EmailReportRequest = serde_json::from_value(serde_json::json!({
            "report": "due_soon",
            "days": 3,
            "recipients": ["pm@example.com"]
        }))
        .unwrap();
        assert_eq!(req.report, ReportKind::DueSoon);
        assert_eq!(req.days, Some(3));
        assert!(req.view.is_none());

        let bad = serde_json::from_value::<EmailReportRequest>(serde_json::json!({
            "report": "pdf",
            "recipients": []
        }));
        assert!(bad.is_err());
    }
}
