//! In-memory filtering and sorting of board rows
//!
//! A board view holds tens to a few hundred bids, so the rows for a view are
//! loaded once and narrowed here rather than in SQL.

use chrono::NaiveDate;
use serde::Deserialize;
use std::cmp::Ordering;
use uuid::Uuid;

use crate::api::PaginationParams;
use crate::domain::{BidResponse, BidStatus, BoardView, UrgencyLevel};
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    DueDate,
    ProjectName,
    Status,
    CreatedAt,
    UpdatedAt,
    EstimatedValue,
    Urgency,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Raw query string for `GET /bids`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BidListQuery {
    #[serde(default)]
    pub view: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    /// Comma-separated status keys or labels
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub urgency: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
    #[serde(default)]
    pub due_from: Option<NaiveDate>,
    #[serde(default)]
    pub due_to: Option<NaiveDate>,
    #[serde(default)]
    pub sort: Option<SortField>,
    #[serde(default)]
    pub direction: Option<SortDirection>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BidFilter {
    pub search: Option<String>,
    pub statuses: Vec<BidStatus>,
    pub urgency: Option<UrgencyLevel>,
    pub assigned_to: Option<Uuid>,
    pub due_from: Option<NaiveDate>,
    pub due_to: Option<NaiveDate>,
}

impl BidListQuery {
    pub fn view(&self) -> Result<BoardView, ApiError> {
        match self.view.as_deref().filter(|v| !v.is_empty()) {
            None => Ok(BoardView::Active),
            Some(v) => BoardView::parse(v)
                .ok_or_else(|| ApiError::bad_request(format!("Unknown view: {}", v))),
        }
    }

    pub fn filter(&self) -> Result<BidFilter, ApiError> {
        let statuses = match self.status.as_deref() {
            None => Vec::new(),
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    BidStatus::parse(s)
                        .ok_or_else(|| ApiError::bad_request(format!("Unknown status: {}", s)))
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        let urgency = match self.urgency.as_deref().filter(|u| !u.is_empty()) {
            None => None,
            Some(raw) => Some(
                UrgencyLevel::parse(raw)
                    .ok_or_else(|| ApiError::bad_request(format!("Unknown urgency: {}", raw)))?,
            ),
        };

        if let (Some(from), Some(to)) = (self.due_from, self.due_to) {
            if from > to {
                return Err(ApiError::bad_request("due_from must not be after due_to"));
            }
        }

        Ok(BidFilter {
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase),
            statuses,
            urgency,
            assigned_to: self.assigned_to,
            due_from: self.due_from,
            due_to: self.due_to,
        })
    }

    pub fn sort(&self) -> (SortField, SortDirection) {
        (
            self.sort.unwrap_or_default(),
            self.direction.unwrap_or_default(),
        )
    }

    pub fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }
}

impl BidFilter {
    pub fn matches(&self, bid: &BidResponse) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&bid.status) {
            return false;
        }
        if let Some(level) = self.urgency {
            if bid.urgency != level {
                return false;
            }
        }
        if let Some(user) = self.assigned_to {
            if bid.assigned_to != Some(user) {
                return false;
            }
        }
        if self.due_from.is_some() || self.due_to.is_some() {
            let Some(due) = bid.due_date else {
                return false;
            };
            if self.due_from.is_some_and(|from| due < from) {
                return false;
            }
            if self.due_to.is_some_and(|to| due > to) {
                return false;
            }
        }
        match &self.search {
            None => true,
            Some(needle) => [
                Some(bid.project_name.as_str()),
                bid.project_address.as_deref(),
                bid.general_contractor.as_deref(),
                bid.project_description.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(needle.as_str())),
        }
    }
}

/// Orders two optional keys with `None` last regardless of direction
fn cmp_optional<T: Ord>(a: Option<T>, b: Option<T>, direction: SortDirection) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => apply_direction(a.cmp(&b), direction),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn apply_direction(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

pub fn sort_bids(bids: &mut [BidResponse], field: SortField, direction: SortDirection) {
    bids.sort_by(|a, b| {
        let primary = match field {
            SortField::DueDate => cmp_optional(a.due_date, b.due_date, direction),
            SortField::EstimatedValue => {
                cmp_optional(a.estimated_value, b.estimated_value, direction)
            }
            SortField::ProjectName => apply_direction(
                a.project_name
                    .to_lowercase()
                    .cmp(&b.project_name.to_lowercase()),
                direction,
            ),
            SortField::Status => apply_direction(a.status.rank().cmp(&b.status.rank()), direction),
            SortField::CreatedAt => apply_direction(a.created_at.cmp(&b.created_at), direction),
            SortField::UpdatedAt => apply_direction(a.updated_at.cmp(&b.updated_at), direction),
            // Most severe first when ascending, earliest due date within a level
            SortField::Urgency => apply_direction(b.urgency.cmp(&a.urgency), direction)
                .then_with(|| cmp_optional(a.due_date, b.due_date, SortDirection::Asc)),
        };
        primary.then_with(|| a.created_at.cmp(&b.created_at))
    });
}

/// Filter then sort a view's rows
pub fn apply(
    bids: Vec<BidResponse>,
    filter: &BidFilter,
    field: SortField,
    direction: SortDirection,
) -> Vec<BidResponse> {
    let mut rows: Vec<BidResponse> = bids.into_iter().filter(|b| filter.matches(b)).collect();
    sort_bids(&mut rows, field, direction);
    rows
}
