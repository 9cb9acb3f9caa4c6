//! Vendor outreach per bid (BidVendor junction)

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::decimal_to_cents;
use super::patch::nullable;
use super::urgency::{UrgencyContext, UrgencyLevel};

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ResponseStatus {
    #[default]
    Pending,
    Yes,
    No,
}

impl ResponseStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ResponseStatus::Pending => "Pending",
            ResponseStatus::Yes => "Will Quote",
            ResponseStatus::No => "Declined",
        }
    }
}

/// BidVendor row joined with the vendor's directory fields
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BidVendorRow {
    pub id: Uuid,
    pub bid_id: Uuid,
    pub vendor_id: Uuid,
    pub company_name: String,
    pub specialty: Option<String>,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub response_status: ResponseStatus,
    pub due_date: Option<NaiveDate>,
    /// The parent bid's due date, used when the request has none of its own
    pub bid_due_date: Option<NaiveDate>,
    pub responded_at: Option<DateTime<Utc>>,
    pub cost_amount: Option<Decimal>,
    pub cost_received_at: Option<DateTime<Utc>>,
    pub is_priority: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const BID_VENDOR_SELECT: &str = r#"
    SELECT bv.id, bv.bid_id, bv.vendor_id, v.company_name, v.specialty, v.contact_person,
           v.email, bv.response_status, bv.due_date, b.due_date AS bid_due_date,
           bv.responded_at, bv.cost_amount, bv.cost_received_at, bv.is_priority, bv.notes,
           bv.created_at, bv.updated_at
    FROM bid_vendors bv
    JOIN vendors v ON v.id = bv.vendor_id
    JOIN bids b ON b.id = bv.bid_id
"#;

impl BidVendorRow {
    /// The request's own due date, falling back to the bid's
    pub fn effective_due_date(&self) -> Option<NaiveDate> {
        self.due_date.or(self.bid_due_date)
    }

    /// Only outstanding requests carry urgency
    pub fn urgency(&self, ctx: &UrgencyContext) -> UrgencyLevel {
        match self.response_status {
            ResponseStatus::Pending => ctx.classify(self.effective_due_date()),
            _ => UrgencyLevel::None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddBidVendorsRequest {
    pub vendor_ids: Vec<Uuid>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_priority: bool,
}

/// Partial update of a vendor's response on a bid. `null` clears the due
/// date or the notes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBidVendorRequest {
    #[serde(default)]
    pub response_status: Option<ResponseStatus>,
    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<NaiveDate>>,
    /// Cents
    #[serde(default)]
    pub cost_amount: Option<i64>,
    #[serde(default)]
    pub is_priority: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
}

impl UpdateBidVendorRequest {
    /// The response status to store, given the current one. A received cost
    /// implies the vendor is quoting.
    pub fn effective_status(&self, current: ResponseStatus) -> ResponseStatus {
        match (self.response_status, self.cost_amount) {
            (Some(status), _) => status,
            (None, Some(_)) if current == ResponseStatus::Pending => ResponseStatus::Yes,
            (None, _) => current,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BidVendorResponse {
    pub id: Uuid,
    pub bid_id: Uuid,
    pub vendor_id: Uuid,
    pub company_name: String,
    pub specialty: Option<String>,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub response_status: ResponseStatus,
    pub response_label: &'static str,
    /// Effective due date
    pub due_date: Option<NaiveDate>,
    pub inherits_bid_due_date: bool,
    pub urgency: UrgencyLevel,
    pub responded_at: Option<DateTime<Utc>>,
    pub cost_amount: Option<i64>,
    pub cost_received_at: Option<DateTime<Utc>>,
    pub is_priority: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BidVendorResponse {
    pub fn from_row(row: BidVendorRow, ctx: &UrgencyContext) -> Self {
        let urgency = row.urgency(ctx);
        let due_date = row.effective_due_date();
        let inherits_bid_due_date = row.due_date.is_none() && row.bid_due_date.is_some();
        Self {
            id: row.id,
            bid_id: row.bid_id,
            vendor_id: row.vendor_id,
            company_name: row.company_name,
            specialty: row.specialty,
            contact_person: row.contact_person,
            email: row.email,
            response_status: row.response_status,
            response_label: row.response_status.label(),
            due_date,
            inherits_bid_due_date,
            urgency,
            responded_at: row.responded_at,
            cost_amount: row.cost_amount.map(decimal_to_cents),
            cost_received_at: row.cost_received_at,
            is_priority: row.is_priority,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn line(
        company: &str,
        specialty: &str,
        status: ResponseStatus,
        cents: Option<i64>,
    ) -> BidVendorRow {
        let now = Utc::now();
        BidVendorRow {
            id: Uuid::new_v4(),
            bid_id: Uuid::nil(),
            vendor_id: Uuid::new_v4(),
            company_name: company.to_string(),
            specialty: Some(specialty.to_string()),
            contact_person: None,
            email: None,
            response_status: status,
            due_date: None,
            bid_due_date: None,
            responded_at: None,
            cost_amount: cents.map(crate::domain::money::cents_to_decimal),
            cost_received_at: cents.map(|_| now),
            is_priority: false,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::line;
    use super::*;
    use crate::domain::urgency::{BusinessCalendar, UrgencyThresholds};

    #[test]
    fn cost_implies_yes_only_when_pending() {
        let req = UpdateBidVendorRequest {
            cost_amount: Some(12_500_00),
            ..Default::default()
        };
        assert_eq!(req.effective_status(ResponseStatus::Pending), ResponseStatus::Yes);
        assert_eq!(req.effective_status(ResponseStatus::No), ResponseStatus::No);
    }

    #[test]
    fn explicit_status_wins() {
        let req = UpdateBidVendorRequest {
            response_status: Some(ResponseStatus::No),
            cost_amount: Some(100),
            ..Default::default()
        };
        assert_eq!(req.effective_status(ResponseStatus::Pending), ResponseStatus::No);
        assert_eq!(
            UpdateBidVendorRequest::default().effective_status(ResponseStatus::Yes),
            ResponseStatus::Yes
        );
    }

    #[test]
    fn answered_requests_are_not_urgent() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let ctx = UrgencyContext {
            calendar: BusinessCalendar::new(),
            thresholds: UrgencyThresholds::default(),
            today,
        };
        let mut row = line("Acme Controls", "Controls", ResponseStatus::Pending, None);
        row.due_date = Some(today);
        assert_eq!(row.urgency(&ctx), UrgencyLevel::DueToday);

        row.response_status = ResponseStatus::Yes;
        assert_eq!(row.urgency(&ctx), UrgencyLevel::None);
    }

    #[test]
    fn pending_request_inherits_the_bid_due_date() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let ctx = UrgencyContext {
            calendar: BusinessCalendar::new(),
            thresholds: UrgencyThresholds::default(),
            today,
        };
        let mut row = line("Cold Air Supply", "Sheet Metal", ResponseStatus::Pending, None);
        row.bid_due_date = NaiveDate::from_ymd_opt(2026, 10, 14);
        assert_eq!(row.urgency(&ctx), UrgencyLevel::Overdue);

        // Its own date wins over the bid's
        row.due_date = Some(today);
        assert_eq!(row.urgency(&ctx), UrgencyLevel::DueToday);

        row.due_date = None;
        let response = BidVendorResponse::from_row(row, &ctx);
        assert_eq!(response.due_date, NaiveDate::from_ymd_opt(2026, 10, 14));
        assert!(response.inherits_bid_due_date);
        assert_eq!(response.urgency, UrgencyLevel::Overdue);
    }

    #[test]
    fn update_null_clears_the_due_date() {
        let req: UpdateBidVendorRequest =
            serde_json::from_value(serde_json::json!({ "due_date": null })).unwrap();
        assert_eq!(req.due_date, Some(None));
        assert_eq!(req.notes, None);
    }
}
