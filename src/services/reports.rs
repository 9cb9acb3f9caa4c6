//! Report building
//!
//! Reports group board rows into summaries. Each one serializes to JSON for
//! the API and renders to an HTML fragment for email delivery.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use uuid::Uuid;

use crate::domain::bid_vendors::{BidVendorRow, ResponseStatus};
use crate::domain::money::{decimal_to_cents, format_cents};
use crate::domain::{BidResponse, BidStatus, BoardView, UrgencyContext, UrgencyLevel};

// ============================================================================
// Pipeline
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub status: BidStatus,
    pub label: &'static str,
    pub count: usize,
    pub total_value: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UrgencyCount {
    pub level: UrgencyLevel,
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub view: BoardView,
    pub generated_on: NaiveDate,
    pub statuses: Vec<StatusSummary>,
    pub urgency: Vec<UrgencyCount>,
    pub total_count: usize,
    pub total_value: i64,
}

/// Per-level counts, most severe first
pub fn urgency_counts<'a>(levels: impl Iterator<Item = &'a UrgencyLevel>) -> Vec<UrgencyCount> {
    let mut counts: BTreeMap<UrgencyLevel, usize> = BTreeMap::new();
    for level in levels {
        *counts.entry(*level).or_default() += 1;
    }
    UrgencyLevel::ALL
        .into_iter()
        .rev()
        .map(|level| UrgencyCount {
            level,
            label: level.label(),
            count: counts.get(&level).copied().unwrap_or(0),
        })
        .collect()
}

pub fn build_pipeline(view: BoardView, bids: &[BidResponse], today: NaiveDate) -> PipelineReport {
    let statuses = BidStatus::ALL
        .into_iter()
        .map(|status| {
            let matching = bids.iter().filter(|b| b.status == status);
            let (count, total_value) = matching.fold((0, 0), |(n, sum), b| {
                (n + 1, sum + b.estimated_value.unwrap_or(0))
            });
            StatusSummary {
                status,
                label: status.label(),
                count,
                total_value,
            }
        })
        .collect::<Vec<_>>();

    PipelineReport {
        view,
        generated_on: today,
        total_count: bids.len(),
        total_value: statuses.iter().map(|s| s.total_value).sum(),
        urgency: urgency_counts(bids.iter().map(|b| &b.urgency)),
        statuses,
    }
}

// ============================================================================
// Due soon
// ============================================================================

/// Pending vendor request joined with its bid, as loaded for reports
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingVendorRequest {
    pub bid_id: Uuid,
    pub project_name: String,
    pub vendor_id: Uuid,
    pub company_name: String,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DueBidLine {
    pub id: Uuid,
    pub project_name: String,
    pub general_contractor: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status_label: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct UrgencyGroup {
    pub level: UrgencyLevel,
    pub label: &'static str,
    pub bids: Vec<DueBidLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingRequestLine {
    pub bid_id: Uuid,
    pub project_name: String,
    pub due_date: Option<NaiveDate>,
    pub urgency: UrgencyLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct VendorGroup {
    pub vendor_id: Uuid,
    pub company_name: String,
    pub requests: Vec<PendingRequestLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DueSoonReport {
    pub generated_on: NaiveDate,
    pub horizon_days: u32,
    pub through: NaiveDate,
    pub groups: Vec<UrgencyGroup>,
    pub pending_vendors: Vec<VendorGroup>,
}

pub fn build_due_soon(
    bids: &[BidResponse],
    pending: &[PendingVendorRequest],
    ctx: &UrgencyContext,
    horizon_days: u32,
) -> DueSoonReport {
    let through = ctx.calendar.add_business_days(ctx.today, horizon_days);

    let mut due: Vec<&BidResponse> = bids
        .iter()
        .filter(|b| b.status.tracks_due_date())
        .filter(|b| b.due_date.is_some_and(|d| d <= through))
        .collect();
    due.sort_by_key(|b| (b.due_date, b.project_name.to_lowercase()));

    let groups = UrgencyLevel::ALL
        .into_iter()
        .rev()
        .filter_map(|level| {
            let lines: Vec<DueBidLine> = due
                .iter()
                .filter(|b| b.urgency == level)
                .map(|b| DueBidLine {
                    id: b.id,
                    project_name: b.project_name.clone(),
                    general_contractor: b.general_contractor.clone(),
                    due_date: b.due_date,
                    status_label: b.status.label(),
                })
                .collect();
            (!lines.is_empty()).then_some(UrgencyGroup {
                level,
                label: level.label(),
                bids: lines,
            })
        })
        .collect();

    let mut by_vendor: BTreeMap<(String, Uuid), Vec<PendingRequestLine>> = BTreeMap::new();
    for request in pending {
        by_vendor
            .entry((request.company_name.to_lowercase(), request.vendor_id))
            .or_default()
            .push(PendingRequestLine {
                bid_id: request.bid_id,
                project_name: request.project_name.clone(),
                due_date: request.due_date,
                urgency: ctx.classify(request.due_date),
            });
    }

    let pending_vendors = by_vendor
        .into_iter()
        .map(|((_, vendor_id), mut requests)| {
            requests.sort_by(|a, b| b.urgency.cmp(&a.urgency).then(a.due_date.cmp(&b.due_date)));
            let company_name = pending
                .iter()
                .find(|p| p.vendor_id == vendor_id)
                .map(|p| p.company_name.clone())
                .unwrap_or_default();
            VendorGroup {
                vendor_id,
                company_name,
                requests,
            }
        })
        .collect();

    DueSoonReport {
        generated_on: ctx.today,
        horizon_days,
        through,
        groups,
        pending_vendors,
    }
}

// ============================================================================
// Vendor costs
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct VendorCostLine {
    pub vendor_id: Uuid,
    pub company_name: String,
    pub specialty: Option<String>,
    pub response_status: ResponseStatus,
    pub response_label: &'static str,
    pub cost_amount: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CostTotals {
    pub vendors: usize,
    pub responded: usize,
    pub pending: usize,
    pub declined: usize,
    pub costs_received: usize,
    pub total_cost: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpecialtyLow {
    pub specialty: String,
    pub company_name: String,
    pub cost_amount: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VendorCostReport {
    pub bid_id: Uuid,
    pub project_name: String,
    pub lines: Vec<VendorCostLine>,
    pub totals: CostTotals,
    pub lowest_by_specialty: Vec<SpecialtyLow>,
}

pub fn build_vendor_costs(bid: &BidResponse, rows: Vec<BidVendorRow>) -> VendorCostReport {
    let mut totals = CostTotals::default();
    let mut lowest: BTreeMap<String, SpecialtyLow> = BTreeMap::new();

    let mut lines: Vec<VendorCostLine> = rows
        .into_iter()
        .map(|row| {
            let cost = row.cost_amount.map(decimal_to_cents);
            totals.vendors += 1;
            match row.response_status {
                ResponseStatus::Pending => totals.pending += 1,
                ResponseStatus::Yes => totals.responded += 1,
                ResponseStatus::No => {
                    totals.responded += 1;
                    totals.declined += 1;
                }
            }
            if let Some(cents) = cost {
                totals.costs_received += 1;
                totals.total_cost += cents;

                let specialty = row
                    .specialty
                    .clone()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| "General".to_string());
                let replace = lowest
                    .get(&specialty)
                    .map_or(true, |current| cents < current.cost_amount);
                if replace {
                    lowest.insert(
                        specialty.clone(),
                        SpecialtyLow {
                            specialty,
                            company_name: row.company_name.clone(),
                            cost_amount: cents,
                        },
                    );
                }
            }

            VendorCostLine {
                vendor_id: row.vendor_id,
                company_name: row.company_name,
                specialty: row.specialty,
                response_status: row.response_status,
                response_label: row.response_status.label(),
                cost_amount: cost,
            }
        })
        .collect();

    lines.sort_by(|a, b| {
        a.specialty
            .cmp(&b.specialty)
            .then(cmp_cost(a.cost_amount, b.cost_amount))
            .then(a.company_name.cmp(&b.company_name))
    });

    VendorCostReport {
        bid_id: bid.id,
        project_name: bid.project_name.clone(),
        lines,
        totals,
        lowest_by_specialty: lowest.into_values().collect(),
    }
}

fn cmp_cost(a: Option<i64>, b: Option<i64>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

// ============================================================================
// HTML rendering
// ============================================================================

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn date_cell(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%b %-d, %Y").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// A report that can be delivered by email
pub trait RenderReport {
    fn title(&self) -> String;
    fn to_html(&self) -> String;
}

impl RenderReport for PipelineReport {
    fn title(&self) -> String {
        format!("{} pipeline - {}", self.view.label(), self.generated_on)
    }

    fn to_html(&self) -> String {
        let mut html = format!("<h2>{}</h2>\n", escape_html(&self.title()));
        html.push_str("<table>\n<tr><th>Status</th><th>Bids</th><th>Value</th></tr>\n");
        for row in &self.statuses {
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                row.label,
                row.count,
                format_cents(row.total_value)
            );
        }
        let _ = writeln!(
            html,
            "<tr><th>Total</th><th>{}</th><th>{}</th></tr>\n</table>",
            self.total_count,
            format_cents(self.total_value)
        );
        html.push_str("<ul>\n");
        for u in self.urgency.iter().filter(|u| u.count > 0) {
            let _ = writeln!(html, "<li>{}: {}</li>", u.label, u.count);
        }
        html.push_str("</ul>\n");
        html
    }
}

impl RenderReport for DueSoonReport {
    fn title(&self) -> String {
        format!("Bids due through {}", self.through)
    }

    fn to_html(&self) -> String {
        let mut html = format!("<h2>{}</h2>\n", escape_html(&self.title()));
        if self.groups.is_empty() {
            html.push_str("<p>No bids due in this window.</p>\n");
        }
        for group in &self.groups {
            let _ = writeln!(html, "<h3>{}</h3>\n<ul>", group.label);
            for bid in &group.bids {
                let _ = writeln!(
                    html,
                    "<li>{} ({}) - {}{}</li>",
                    escape_html(&bid.project_name),
                    bid.status_label,
                    date_cell(bid.due_date),
                    bid.general_contractor
                        .as_deref()
                        .map(|gc| format!(" - {}", escape_html(gc)))
                        .unwrap_or_default()
                );
            }
            html.push_str("</ul>\n");
        }
        if !self.pending_vendors.is_empty() {
            html.push_str("<h3>Waiting on vendors</h3>\n");
            for vendor in &self.pending_vendors {
                let _ = writeln!(html, "<h4>{}</h4>\n<ul>", escape_html(&vendor.company_name));
                for req in &vendor.requests {
                    let _ = writeln!(
                        html,
                        "<li>{} - due {} ({})</li>",
                        escape_html(&req.project_name),
                        date_cell(req.due_date),
                        req.urgency.label()
                    );
                }
                html.push_str("</ul>\n");
            }
        }
        html
    }
}

impl RenderReport for VendorCostReport {
    fn title(&self) -> String {
        format!("Vendor costs - {}", self.project_name)
    }

    fn to_html(&self) -> String {
        let mut html = format!("<h2>{}</h2>\n", escape_html(&self.title()));
        html.push_str(
            "<table>\n<tr><th>Vendor</th><th>Specialty</th><th>Response</th><th>Cost</th></tr>\n",
        );
        for line in &self.lines {
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&line.company_name),
                escape_html(line.specialty.as_deref().unwrap_or("-")),
                line.response_label,
                line.cost_amount
                    .map(format_cents)
                    .unwrap_or_else(|| "-".to_string())
            );
        }
        html.push_str("</table>\n");
        let t = &self.totals;
        let _ = writeln!(
            html,
            "<p>{} vendors, {} responded ({} declined), {} pending, {} costs received totaling {}.</p>",
            t.vendors,
            t.responded,
            t.declined,
            t.pending,
            t.costs_received,
            format_cents(t.total_cost)
        );
        if !self.lowest_by_specialty.is_empty() {
            html.push_str("<h3>Lowest cost by specialty</h3>\n<ul>\n");
            for low in &self.lowest_by_specialty {
                let _ = writeln!(
                    html,
                    "<li>{}: {} at {}</li>",
                    escape_html(&low.specialty),
                    escape_html(&low.company_name),
                    format_cents(low.cost_amount)
                );
            }
            html.push_str("</ul>\n");
        }
        html
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bid_vendors::fixtures::line;
    use crate::domain::bids::fixtures::bid;
    use crate::domain::urgency::{BusinessCalendar, UrgencyThresholds};
    use chrono::Duration;

    fn ctx() -> UrgencyContext {
        UrgencyContext {
            calendar: BusinessCalendar::new(),
            thresholds: UrgencyThresholds::default(),
            today: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        }
    }

    fn response(name: &str, status: BidStatus, due_in: Option<i64>, cents: Option<i64>) -> BidResponse {
        let mut b = bid(name);
        b.status = status;
        b.due_date = due_in.map(|d| ctx().today + Duration::days(d));
        b.estimated_value = cents.map(crate::domain::money::cents_to_decimal);
        BidResponse::from_bid(b, &ctx())
    }

    #[test]
    fn pipeline_groups_by_status() {
        let bids = vec![
            response("A", BidStatus::New, Some(0), Some(100_00)),
            response("B", BidStatus::New, None, Some(50_00)),
            response("C", BidStatus::Won, None, None),
        ];
        let report = build_pipeline(BoardView::Active, &bids, ctx().today);

        assert_eq!(report.total_count, 3);
        assert_eq!(report.total_value, 150_00);
        let new = &report.statuses[0];
        assert_eq!((new.status, new.count, new.total_value), (BidStatus::New, 2, 150_00));
        assert_eq!(report.statuses.len(), 6);
        assert_eq!(report.urgency[0].level, UrgencyLevel::Overdue);
        assert_eq!(report.urgency[1].count, 1, "one bid due today");
    }

    #[test]
    fn due_soon_window_and_grouping() {
        let bids = vec![
            response("Late", BidStatus::New, Some(-2), None),
            response("Today", BidStatus::DraftingBid, Some(0), None),
            response("Friday", BidStatus::GatheringCosts, Some(4), None),
            response("Far", BidStatus::New, Some(30), None),
            response("Sent", BidStatus::BidSent, Some(1), None),
        ];
        let report = build_due_soon(&bids, &[], &ctx(), 5);

        assert_eq!(report.through, NaiveDate::from_ymd_opt(2026, 10, 26).unwrap());
        let levels: Vec<UrgencyLevel> = report.groups.iter().map(|g| g.level).collect();
        assert_eq!(
            levels,
            vec![UrgencyLevel::Overdue, UrgencyLevel::DueToday, UrgencyLevel::Warning]
        );
        let all: Vec<&str> = report
            .groups
            .iter()
            .flat_map(|g| g.bids.iter().map(|b| b.project_name.as_str()))
            .collect();
        assert_eq!(all, vec!["Late", "Today", "Friday"]);
    }

    #[test]
    fn due_soon_groups_pending_requests_by_vendor() {
        let today = ctx().today;
        let vendor = Uuid::new_v4();
        let pending = vec![
            PendingVendorRequest {
                bid_id: Uuid::new_v4(),
                project_name: "Later job".into(),
                vendor_id: vendor,
                company_name: "Acme Controls".into(),
                due_date: Some(today + Duration::days(20)),
            },
            PendingVendorRequest {
                bid_id: Uuid::new_v4(),
                project_name: "Urgent job".into(),
                vendor_id: vendor,
                company_name: "Acme Controls".into(),
                due_date: Some(today - Duration::days(1)),
            },
            PendingVendorRequest {
                bid_id: Uuid::new_v4(),
                project_name: "Other".into(),
                vendor_id: Uuid::new_v4(),
                company_name: "Bay Insulation".into(),
                due_date: None,
            },
        ];
        let report = build_due_soon(&[], &pending, &ctx(), 5);

        assert_eq!(report.pending_vendors.len(), 2);
        let acme = &report.pending_vendors[0];
        assert_eq!(acme.company_name, "Acme Controls");
        assert_eq!(acme.requests[0].project_name, "Urgent job");
        assert_eq!(acme.requests[0].urgency, UrgencyLevel::Overdue);
    }

    #[test]
    fn vendor_cost_totals_and_lowest() {
        let b = response("Clinic", BidStatus::GatheringCosts, None, None);
        let rows = vec![
            line("Acme Controls", "Controls", ResponseStatus::Yes, Some(9_000_00)),
            line("Delta Controls", "Controls", ResponseStatus::Yes, Some(8_500_00)),
            line("Northside Sheet Metal", "Ductwork", ResponseStatus::Pending, None),
            line("Bay Insulation", "Insulation", ResponseStatus::No, None),
        ];
        let report = build_vendor_costs(&b, rows);

        assert_eq!(
            report.totals,
            CostTotals {
                vendors: 4,
                responded: 3,
                pending: 1,
                declined: 1,
                costs_received: 2,
                total_cost: 17_500_00,
            }
        );
        assert_eq!(report.lowest_by_specialty.len(), 1);
        assert_eq!(report.lowest_by_specialty[0].company_name, "Delta Controls");
        assert_eq!(report.lines[0].company_name, "Delta Controls");

        let html = report.to_html();
        assert!(html.contains("$8,500.00"));
        assert!(html.contains("Lowest cost by specialty"));
    }

    #[test]
    fn html_is_escaped() {
        assert_eq!(escape_html("<b>A&B</b>"), "&lt;b&gt;A&amp;B&lt;/b&gt;");
        let bids = vec![response("<script>", BidStatus::New, Some(0), None)];
        let html = build_due_soon(&bids, &[], &ctx(), 5).to_html();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }
}
