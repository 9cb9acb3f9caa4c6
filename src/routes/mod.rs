pub mod apm;
pub mod bid_vendors;
pub mod bids;
pub mod dashboard;
pub mod equipment;
pub mod health;
pub mod me;
pub mod notes;
pub mod realtime;
pub mod reports;
pub mod timeline;
pub mod vendors;

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;
use crate::services::{cache, realtime as feed, ChangeEvent};

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Public
        .route("/health", get(health::health_check))
        // Users
        .route("/me", get(me::get_me))
        .route("/users", get(me::list_users))
        .route("/users/me", patch(me::update_profile))
        // Board
        .route("/bids", get(bids::list_bids).post(bids::create_bid))
        .route(
            "/bids/:bid_id",
            get(bids::get_bid)
                .patch(bids::update_bid)
                .delete(bids::delete_bid),
        )
        .route("/bids/:bid_id/status", put(bids::set_status))
        .route("/bids/:bid_id/hold", post(bids::hold_bid))
        .route("/bids/:bid_id/resume", post(bids::resume_bid))
        .route("/bids/:bid_id/archive", post(bids::archive_bid))
        .route("/bids/:bid_id/unarchive", post(bids::unarchive_bid))
        // APM
        .route("/bids/:bid_id/apm/send", post(bids::send_to_apm))
        .route("/bids/:bid_id/apm/return", post(bids::return_to_estimating))
        .route("/bids/:bid_id/apm/hold", post(bids::apm_hold))
        .route("/bids/:bid_id/apm/resume", post(bids::apm_resume))
        .route("/bids/:bid_id/apm/archive", post(bids::apm_archive))
        .route("/bids/:bid_id/apm/unarchive", post(bids::apm_unarchive))
        .route("/bids/:bid_id/apm/phases", get(apm::list_phases))
        // Vendor outreach
        .route(
            "/bids/:bid_id/vendors",
            get(bid_vendors::list_bid_vendors).post(bid_vendors::add_bid_vendors),
        )
        .route(
            "/bids/:bid_id/vendors/:bid_vendor_id",
            patch(bid_vendors::update_bid_vendor).delete(bid_vendors::remove_bid_vendor),
        )
        .route(
            "/bids/:bid_id/vendors/:bid_vendor_id/phases/:phase",
            put(apm::upsert_phase),
        )
        // Notes, timeline, equipment
        .route(
            "/bids/:bid_id/notes",
            get(notes::list_notes).post(notes::add_note),
        )
        .route("/bids/:bid_id/notes/:note_id", delete(notes::delete_note))
        .route("/bids/:bid_id/timeline", get(timeline::list_timeline))
        .route(
            "/bids/:bid_id/equipment",
            get(equipment::list_equipment).post(equipment::add_equipment),
        )
        .route(
            "/bids/:bid_id/equipment/:equipment_id",
            patch(equipment::update_equipment).delete(equipment::delete_equipment),
        )
        // Vendor directory
        .route(
            "/vendors",
            get(vendors::list_vendors).post(vendors::create_vendor),
        )
        .route(
            "/vendors/:vendor_id",
            get(vendors::get_vendor)
                .patch(vendors::update_vendor)
                .delete(vendors::delete_vendor),
        )
        // Reports
        .route("/reports/pipeline", get(reports::pipeline))
        .route("/reports/due-soon", get(reports::due_soon))
        .route(
            "/bids/:bid_id/reports/vendor-costs",
            get(reports::vendor_costs),
        )
        .route("/reports/email", post(reports::email_report))
        .route("/dashboard", get(dashboard::get_dashboard))
        .route("/realtime", get(realtime::stream_changes))
}

/// Post-commit bookkeeping shared by every write: announce the change and
/// drop cached board aggregates.
pub(crate) async fn changed(state: &AppState, event: ChangeEvent) {
    feed::announce(&state.db, event).await;
    cache::invalidate(state.cache.as_ref()).await;
}
