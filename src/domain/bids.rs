//! Bid / project domain types

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::money::decimal_to_cents;
use super::patch::nullable;
use super::urgency::{UrgencyContext, UrgencyLevel};
use super::views::BoardView;

/// Bid lifecycle status
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, Default, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum BidStatus {
    #[default]
    New,
    GatheringCosts,
    DraftingBid,
    BidSent,
    Won,
    Lost,
}

impl BidStatus {
    /// Lifecycle order, used for sorting and report rows
    pub const ALL: [BidStatus; 6] = [
        BidStatus::New,
        BidStatus::GatheringCosts,
        BidStatus::DraftingBid,
        BidStatus::BidSent,
        BidStatus::Won,
        BidStatus::Lost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BidStatus::New => "new",
            BidStatus::GatheringCosts => "gathering_costs",
            BidStatus::DraftingBid => "drafting_bid",
            BidStatus::BidSent => "bid_sent",
            BidStatus::Won => "won",
            BidStatus::Lost => "lost",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BidStatus::New => "New",
            BidStatus::GatheringCosts => "Gathering Costs",
            BidStatus::DraftingBid => "Drafting Bid",
            BidStatus::BidSent => "Bid Sent",
            BidStatus::Won => "Won",
            BidStatus::Lost => "Lost",
        }
    }

    /// Position in the lifecycle
    pub fn rank(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0)
    }

    /// Accepts the snake_case key or the display label, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        let needle = s.trim();
        Self::ALL.into_iter().find(|status| {
            status.as_str().eq_ignore_ascii_case(needle)
                || status.label().eq_ignore_ascii_case(needle)
        })
    }

    /// Once a bid is sent the estimating deadline no longer applies
    pub fn tracks_due_date(&self) -> bool {
        matches!(
            self,
            BidStatus::New | BidStatus::GatheringCosts | BidStatus::DraftingBid
        )
    }
}

impl std::fmt::Display for BidStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BidStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        BidStatus::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown bid status: {}", raw)))
    }
}

/// Bid entity as stored
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Bid {
    pub id: Uuid,
    pub project_name: String,
    pub project_address: Option<String>,
    pub general_contractor: Option<String>,
    pub project_description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: BidStatus,
    pub estimated_value: Option<Decimal>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub on_hold: bool,
    pub on_hold_at: Option<DateTime<Utc>>,
    pub archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub sent_to_apm: bool,
    pub sent_to_apm_at: Option<DateTime<Utc>>,
    pub apm_assigned_to: Option<Uuid>,
    pub apm_on_hold: bool,
    pub apm_on_hold_at: Option<DateTime<Utc>>,
    pub apm_archived: bool,
    pub apm_archived_at: Option<DateTime<Utc>>,
    pub bid_sent_at: Option<DateTime<Utc>>,
    pub won_at: Option<DateTime<Utc>>,
    pub lost_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bid {
    pub fn view(&self) -> BoardView {
        BoardView::of(self)
    }

    pub fn urgency(&self, ctx: &UrgencyContext) -> UrgencyLevel {
        if self.status.tracks_due_date() {
            ctx.classify(self.due_date)
        } else {
            UrgencyLevel::None
        }
    }
}

/// Column list shared by every bid query
pub const BID_COLUMNS: &str = r#"
    id, project_name, project_address, general_contractor, project_description,
    due_date, status, estimated_value, assigned_to, created_by,
    on_hold, on_hold_at, archived, archived_at,
    sent_to_apm, sent_to_apm_at, apm_assigned_to, apm_on_hold, apm_on_hold_at,
    apm_archived, apm_archived_at, bid_sent_at, won_at, lost_at,
    created_at, updated_at
"#;

/// Request DTO for creating a bid
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBidRequest {
    pub project_name: String,
    #[serde(default)]
    pub project_address: Option<String>,
    #[serde(default)]
    pub general_contractor: Option<String>,
    #[serde(default)]
    pub project_description: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: BidStatus,
    /// Cents
    #[serde(default)]
    pub estimated_value: Option<i64>,
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
}

/// Request DTO for updating a bid. Absent fields are left untouched and an
/// explicit `null` clears a nullable one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBidRequest {
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub project_address: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub general_contractor: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub project_description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<NaiveDate>>,
    /// Cents
    #[serde(default, deserialize_with = "nullable")]
    pub estimated_value: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub assigned_to: Option<Option<Uuid>>,
}

impl UpdateBidRequest {
    /// Names of the fields present in the request, for the timeline
    pub fn changed_fields(&self) -> Vec<&'static str> {
        [
            ("project_name", self.project_name.is_some()),
            ("project_address", self.project_address.is_some()),
            ("general_contractor", self.general_contractor.is_some()),
            ("project_description", self.project_description.is_some()),
            ("due_date", self.due_date.is_some()),
            ("estimated_value", self.estimated_value.is_some()),
            ("assigned_to", self.assigned_to.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendToApmRequest {
    #[serde(default)]
    pub apm_assigned_to: Option<Uuid>,
}

/// Response DTO for bid
#[derive(Debug, Clone, Serialize)]
pub struct BidResponse {
    pub id: Uuid,
    pub project_name: String,
    pub project_address: Option<String>,
    pub general_contractor: Option<String>,
    pub project_description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: BidStatus,
    pub status_label: &'static str,
    pub urgency: UrgencyLevel,
    pub view: BoardView,
    pub estimated_value: Option<i64>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub on_hold: bool,
    pub archived: bool,
    pub sent_to_apm: bool,
    pub sent_to_apm_at: Option<DateTime<Utc>>,
    pub apm_assigned_to: Option<Uuid>,
    pub apm_on_hold: bool,
    pub apm_archived: bool,
    pub bid_sent_at: Option<DateTime<Utc>>,
    pub won_at: Option<DateTime<Utc>>,
    pub lost_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BidResponse {
    pub fn from_bid(bid: Bid, ctx: &UrgencyContext) -> Self {
        let urgency = bid.urgency(ctx);
        let view = bid.view();
        Self {
            id: bid.id,
            project_name: bid.project_name,
            project_address: bid.project_address,
            general_contractor: bid.general_contractor,
            project_description: bid.project_description,
            due_date: bid.due_date,
            status: bid.status,
            status_label: bid.status.label(),
            urgency,
            view,
            estimated_value: bid.estimated_value.map(decimal_to_cents),
            assigned_to: bid.assigned_to,
            created_by: bid.created_by,
            on_hold: bid.on_hold,
            archived: bid.archived,
            sent_to_apm: bid.sent_to_apm,
            sent_to_apm_at: bid.sent_to_apm_at,
            apm_assigned_to: bid.apm_assigned_to,
            apm_on_hold: bid.apm_on_hold,
            apm_archived: bid.apm_archived,
            bid_sent_at: bid.bid_sent_at,
            won_at: bid.won_at,
            lost_at: bid.lost_at,
            created_at: bid.created_at,
            updated_at: bid.updated_at,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::bid;
    use super::*;
    use crate::domain::urgency::{BusinessCalendar, UrgencyThresholds};

    fn ctx(today: NaiveDate) -> UrgencyContext {
        UrgencyContext {
            calendar: BusinessCalendar::new(),
            thresholds: UrgencyThresholds::default(),
            today,
        }
    }

    #[test]
    fn status_parses_keys_and_labels() {
        assert_eq!(BidStatus::parse("gathering_costs"), Some(BidStatus::GatheringCosts));
        assert_eq!(BidStatus::parse("Drafting Bid"), Some(BidStatus::DraftingBid));
        assert_eq!(BidStatus::parse(" bid sent "), Some(BidStatus::BidSent));
        assert_eq!(BidStatus::parse("WON"), Some(BidStatus::Won));
        assert_eq!(BidStatus::parse("pending"), None);
    }

    #[test]
    fn lifecycle_rank_follows_declaration_order() {
        let ranks: Vec<usize> = BidStatus::ALL.iter().map(BidStatus::rank).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn sent_and_closed_bids_are_never_urgent() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let mut b = bid("Library retrofit");
        b.due_date = Some(NaiveDate::from_ymd_opt(2026, 10, 1).unwrap());

        assert_eq!(b.urgency(&ctx(today)), UrgencyLevel::Overdue);
        for status in [BidStatus::BidSent, BidStatus::Won, BidStatus::Lost] {
            b.status = status;
            assert_eq!(b.urgency(&ctx(today)), UrgencyLevel::None);
        }
    }

    #[test]
    fn response_carries_cents_and_labels() {
        let mut b = bid("Hospital wing");
        b.estimated_value = Some(Decimal::new(250_000_00, 2));
        b.status = BidStatus::DraftingBid;
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();

        let response = BidResponse::from_bid(b, &ctx(today));
        assert_eq!(response.estimated_value, Some(25_000_000));
        assert_eq!(response.status_label, "Drafting Bid");
        assert_eq!(response.view, BoardView::Active);
    }

    #[test]
    fn changed_fields_lists_present_fields() {
        let req = UpdateBidRequest {
            project_name: Some("Renamed".into()),
            due_date: Some(NaiveDate::from_ymd_opt(2026, 11, 2)),
            ..Default::default()
        };
        assert_eq!(req.changed_fields(), vec!["project_name", "due_date"]);
    }

    #[test]
    fn update_null_clears_and_absent_keeps() {
        let req: UpdateBidRequest = serde_json::from_value(serde_json::json!({
            "due_date": null,
            "general_contractor": "Turner",
            "estimated_value": null
        }))
        .unwrap();
        assert_eq!(req.due_date, Some(None));
        assert_eq!(req.estimated_value, Some(None));
        assert_eq!(req.general_contractor, Some(Some("Turner".to_string())));
        assert_eq!(req.project_address, None);
        assert_eq!(req.assigned_to, None);
        assert_eq!(
            req.changed_fields(),
            vec!["general_contractor", "due_date", "estimated_value"]
        );
    }

    #[test]
    fn create_accepts_status_labels() {
        let req: CreateBidRequest = serde_json::from_value(serde_json::json!({
            "project_name": "Clinic",
            "status": "Gathering Costs"
        }))
        .unwrap();
        assert_eq!(req.status, BidStatus::GatheringCosts);

        let keyed: CreateBidRequest = serde_json::from_value(serde_json::json!({
            "project_name": "Clinic",
            "status": "drafting_bid"
        }))
        .unwrap();
        assert_eq!(keyed.status, BidStatus::DraftingBid);

        let defaulted: CreateBidRequest =
            serde_json::from_value(serde_json::json!({ "project_name": "Clinic" })).unwrap();
        assert_eq!(defaulted.status, BidStatus::New);

        assert!(serde_json::from_value::<CreateBidRequest>(serde_json::json!({
            "project_name": "Clinic",
            "status": "shelved"
        }))
        .is_err());
    }
}
