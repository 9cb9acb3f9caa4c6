//! Board dashboard summary

use axum::extract::{Query, State};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::bids::load_view;
use super::reports::{pending_requests, ViewQuery};
use crate::api::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::{BidResponse, BidStatus, BoardView, UrgencyContext, UrgencyLevel};
use crate::error::ApiResult;
use crate::services::cache::keys;
use crate::services::reports::PendingVendorRequest;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCount {
    pub status: BidStatus,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LevelCount {
    pub level: UrgencyLevel,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub view: BoardView,
    pub as_of: NaiveDate,
    pub total: usize,
    pub by_status: Vec<StatusCount>,
    pub by_urgency: Vec<LevelCount>,
    pub overdue_vendor_requests: usize,
}

pub fn summarize(
    view: BoardView,
    bids: &[BidResponse],
    pending: &[PendingVendorRequest],
    ctx: &UrgencyContext,
) -> DashboardSummary {
    let by_status = BidStatus::ALL
        .into_iter()
        .map(|status| StatusCount {
            status,
            count: bids.iter().filter(|b| b.status == status).count(),
        })
        .collect();

    let by_urgency = UrgencyLevel::ALL
        .into_iter()
        .rev()
        .map(|level| LevelCount {
            level,
            count: bids.iter().filter(|b| b.urgency == level).count(),
        })
        .collect();

    let overdue_vendor_requests = pending
        .iter()
        .filter(|p| ctx.classify(p.due_date) == UrgencyLevel::Overdue)
        .count();

    DashboardSummary {
        view,
        as_of: ctx.today,
        total: bids.len(),
        by_status,
        by_urgency,
        overdue_vendor_requests,
    }
}

/// GET /dashboard
pub async fn get_dashboard(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ViewQuery>,
) -> ApiResult<DataResponse<DashboardSummary>> {
    let view = query.view()?;
    let ctx = state.urgency_context();
    let key = keys::dashboard(view, ctx.today);

    if let Some(cache) = state.cache.as_ref() {
        if let Some(summary) = cache.get::<DashboardSummary>(&key).await {
            return Ok(DataResponse::new(summary));
        }
    }

    let bids = load_view(&state.db, view, &ctx).await?;
    let pending = pending_requests(&state.db, view).await?;
    let summary = summarize(view, &bids, &pending, &ctx);

    if let Some(cache) = state.cache.as_ref() {
        cache.put(&key, &summary).await;
    }

    Ok(DataResponse::new(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bids::fixtures::bid;
    use crate::domain::urgency::{BusinessCalendar, UrgencyThresholds};
    use chrono::Duration;
    use uuid::Uuid;

    fn ctx() -> UrgencyContext {
        UrgencyContext {
            calendar: BusinessCalendar::new(),
            thresholds: UrgencyThresholds::default(),
            today: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        }
    }

    fn response(status: BidStatus, due_in: Option<i64>) -> BidResponse {
        let mut b = bid("Job");
        b.status = status;
        b.due_date = due_in.map(|d| ctx().today + Duration::days(d));
        BidResponse::from_bid(b, &ctx())
    }

    fn pending(due_in: Option<i64>) -> PendingVendorRequest {
        PendingVendorRequest {
            bid_id: Uuid::new_v4(),
            project_name: "Job".into(),
            vendor_id: Uuid::new_v4(),
            company_name: "Acme".into(),
            due_date: due_in.map(|d| ctx().today + Duration::days(d)),
        }
    }

    #[test]
    fn counts_statuses_levels_and_overdue_requests() {
        let bids = vec![
            response(BidStatus::New, Some(-1)),
            response(BidStatus::New, Some(0)),
            response(BidStatus::Won, Some(-10)),
        ];
        let requests = vec![pending(Some(-3)), pending(Some(2)), pending(None)];
        let summary = summarize(BoardView::Active, &bids, &requests, &ctx());

        assert_eq!(summary.total, 3);
        assert_eq!(
            summary.by_status[0],
            StatusCount {
                status: BidStatus::New,
                count: 2
            }
        );
        assert_eq!(summary.by_status.iter().map(|s| s.count).sum::<usize>(), 3);
        assert_eq!(
            summary.by_urgency[0],
            LevelCount {
                level: UrgencyLevel::Overdue,
                count: 1
            }
        );
        assert_eq!(summary.by_urgency.iter().map(|l| l.count).sum::<usize>(), 3);
        assert_eq!(summary.overdue_vendor_requests, 1);
    }

    #[test]
    fn summary_survives_a_cache_round_trip() {
        let summary = summarize(BoardView::ApmActive, &[], &[], &ctx());
        let json = serde_json::to_string(&summary).unwrap();
        let back: DashboardSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.view, BoardView::ApmActive);
        assert_eq!(back.by_status.len(), BidStatus::ALL.len());
    }
}
