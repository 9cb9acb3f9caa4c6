//! APM procurement and closeout phases per vendor

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::patch::nullable;
use super::urgency::{UrgencyContext, UrgencyLevel};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ApmPhase {
    BuyNumber,
    PurchaseOrder,
    Submittals,
    RevisedPlans,
    EquipmentRelease,
    Closeouts,
}

impl ApmPhase {
    pub const ALL: [ApmPhase; 6] = [
        ApmPhase::BuyNumber,
        ApmPhase::PurchaseOrder,
        ApmPhase::Submittals,
        ApmPhase::RevisedPlans,
        ApmPhase::EquipmentRelease,
        ApmPhase::Closeouts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApmPhase::BuyNumber => "buy_number",
            ApmPhase::PurchaseOrder => "purchase_order",
            ApmPhase::Submittals => "submittals",
            ApmPhase::RevisedPlans => "revised_plans",
            ApmPhase::EquipmentRelease => "equipment_release",
            ApmPhase::Closeouts => "closeouts",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ApmPhase::BuyNumber => "Buy Number",
            ApmPhase::PurchaseOrder => "Purchase Order",
            ApmPhase::Submittals => "Submittals",
            ApmPhase::RevisedPlans => "Revised Plans",
            ApmPhase::EquipmentRelease => "Equipment Release",
            ApmPhase::Closeouts => "Closeouts",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let key = s.trim().to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|p| p.as_str() == key)
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum PhaseStatus {
    #[default]
    Pending,
    Requested,
    Received,
    Approved,
    NotNeeded,
}

impl PhaseStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PhaseStatus::Pending => "Pending",
            PhaseStatus::Requested => "Requested",
            PhaseStatus::Received => "Received",
            PhaseStatus::Approved => "Approved",
            PhaseStatus::NotNeeded => "Not Needed",
        }
    }

    /// Closed phases no longer need follow-up
    pub fn is_open(&self) -> bool {
        matches!(self, PhaseStatus::Pending | PhaseStatus::Requested)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApmPhaseRow {
    pub bid_vendor_id: Uuid,
    pub phase: ApmPhase,
    pub status: PhaseStatus,
    pub requested_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub follow_up_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Phase update. An absent follow-up date keeps the stored one; `null`
/// clears it.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertPhaseRequest {
    pub status: PhaseStatus,
    #[serde(default, deserialize_with = "nullable")]
    pub follow_up_date: Option<Option<NaiveDate>>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseResponse {
    pub phase: ApmPhase,
    pub label: &'static str,
    pub status: PhaseStatus,
    pub requested_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub follow_up_date: Option<NaiveDate>,
    pub follow_up_urgency: UrgencyLevel,
    pub notes: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PhaseResponse {
    fn pending(phase: ApmPhase) -> Self {
        Self {
            phase,
            label: phase.label(),
            status: PhaseStatus::Pending,
            requested_at: None,
            received_at: None,
            follow_up_date: None,
            follow_up_urgency: UrgencyLevel::None,
            notes: None,
            updated_at: None,
        }
    }

    fn from_row(row: ApmPhaseRow, ctx: &UrgencyContext) -> Self {
        let follow_up_urgency = if row.status.is_open() {
            ctx.classify(row.follow_up_date)
        } else {
            UrgencyLevel::None
        };
        Self {
            phase: row.phase,
            label: row.phase.label(),
            status: row.status,
            requested_at: row.requested_at,
            received_at: row.received_at,
            follow_up_date: row.follow_up_date,
            follow_up_urgency,
            notes: row.notes,
            updated_at: Some(row.updated_at),
        }
    }
}

/// All phases for one vendor on a bid
#[derive(Debug, Clone, Serialize)]
pub struct VendorPhases {
    pub bid_vendor_id: Uuid,
    pub vendor_id: Uuid,
    pub company_name: String,
    pub phases: Vec<PhaseResponse>,
}

/// Expands stored rows to the full phase grid, filling gaps with `pending`
pub fn phase_grid(
    bid_vendor_id: Uuid,
    vendor_id: Uuid,
    company_name: String,
    rows: &[ApmPhaseRow],
    ctx: &UrgencyContext,
) -> VendorPhases {
    let phases = ApmPhase::ALL
        .into_iter()
        .map(|phase| {
            rows.iter()
                .find(|r| r.bid_vendor_id == bid_vendor_id && r.phase == phase)
                .cloned()
                .map(|row| PhaseResponse::from_row(row, ctx))
                .unwrap_or_else(|| PhaseResponse::pending(phase))
        })
        .collect();

    VendorPhases {
        bid_vendor_id,
        vendor_id,
        company_name,
        phases,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::urgency::{BusinessCalendar, UrgencyThresholds};

    fn ctx() -> UrgencyContext {
        UrgencyContext {
            calendar: BusinessCalendar::new(),
            thresholds: UrgencyThresholds::default(),
            today: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        }
    }

    fn row(bid_vendor_id: Uuid, phase: ApmPhase, status: PhaseStatus) -> ApmPhaseRow {
        ApmPhaseRow {
            bid_vendor_id,
            phase,
            status,
            requested_at: None,
            received_at: None,
            follow_up_date: NaiveDate::from_ymd_opt(2026, 10, 1),
            notes: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn grid_has_every_phase_in_order() {
        let bv = Uuid::new_v4();
        let rows = vec![row(bv, ApmPhase::Submittals, PhaseStatus::Requested)];
        let grid = phase_grid(bv, Uuid::new_v4(), "Acme".into(), &rows, &ctx());

        let phases: Vec<ApmPhase> = grid.phases.iter().map(|p| p.phase).collect();
        assert_eq!(phases, ApmPhase::ALL.to_vec());
        assert_eq!(grid.phases[2].status, PhaseStatus::Requested);
        assert_eq!(grid.phases[2].follow_up_urgency, UrgencyLevel::Overdue);
        assert_eq!(grid.phases[0].status, PhaseStatus::Pending);
    }

    #[test]
    fn closed_phases_are_not_urgent() {
        let bv = Uuid::new_v4();
        let rows = vec![row(bv, ApmPhase::Closeouts, PhaseStatus::Approved)];
        let grid = phase_grid(bv, Uuid::new_v4(), "Acme".into(), &rows, &ctx());
        assert_eq!(grid.phases[5].follow_up_urgency, UrgencyLevel::None);
    }

    #[test]
    fn rows_of_other_vendors_are_ignored() {
        let bv = Uuid::new_v4();
        let rows = vec![row(Uuid::new_v4(), ApmPhase::BuyNumber, PhaseStatus::Received)];
        let grid = phase_grid(bv, Uuid::new_v4(), "Acme".into(), &rows, &ctx());
        assert!(grid.phases.iter().all(|p| p.status == PhaseStatus::Pending));
    }

    #[test]
    fn phase_parsing() {
        assert_eq!(ApmPhase::parse("purchase-order"), Some(ApmPhase::PurchaseOrder));
        assert_eq!(ApmPhase::parse("closeouts"), Some(ApmPhase::Closeouts));
        assert_eq!(ApmPhase::parse("invoice"), None);
    }

    #[test]
    fn omitted_follow_up_is_kept() {
        let req: UpsertPhaseRequest =
            serde_json::from_value(serde_json::json!({ "status": "received" })).unwrap();
        assert_eq!(req.follow_up_date, None);

        let cleared: UpsertPhaseRequest = serde_json::from_value(serde_json::json!({
            "status": "requested",
            "follow_up_date": null
        }))
        .unwrap();
        assert_eq!(cleared.follow_up_date, Some(None));
    }
}
