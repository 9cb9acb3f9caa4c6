//! Due-date urgency classification
//!
//! Urgency is a label derived from a due date and "today". Distances are
//! counted in business days: weekends and configured holidays do not count.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Urgency level, ordered from least to most severe
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    #[default]
    None,
    Warning,
    Critical,
    DueToday,
    Overdue,
}

impl UrgencyLevel {
    pub const ALL: [UrgencyLevel; 5] = [
        UrgencyLevel::None,
        UrgencyLevel::Warning,
        UrgencyLevel::Critical,
        UrgencyLevel::DueToday,
        UrgencyLevel::Overdue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UrgencyLevel::None => "none",
            UrgencyLevel::Warning => "warning",
            UrgencyLevel::Critical => "critical",
            UrgencyLevel::DueToday => "due_today",
            UrgencyLevel::Overdue => "overdue",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UrgencyLevel::None => "On Track",
            UrgencyLevel::Warning => "Due Soon",
            UrgencyLevel::Critical => "Critical",
            UrgencyLevel::DueToday => "Due Today",
            UrgencyLevel::Overdue => "Overdue",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let key = s.trim().to_lowercase().replace([' ', '-'], "_");
        Self::ALL.into_iter().find(|level| level.as_str() == key)
    }
}

impl std::fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business-day thresholds for the `critical` and `warning` buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrgencyThresholds {
    pub critical_days: u32,
    pub warning_days: u32,
}

impl Default for UrgencyThresholds {
    fn default() -> Self {
        Self {
            critical_days: 2,
            warning_days: 5,
        }
    }
}

/// Calendar of working days
#[derive(Debug, Clone, Default)]
pub struct BusinessCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl BusinessCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_holidays(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }

    /// Number of business days in `(from, to]`. Zero when `to <= from`.
    pub fn business_days_between(&self, from: NaiveDate, to: NaiveDate) -> u32 {
        let mut count = 0;
        let mut day = from;
        while day < to {
            day = match day.checked_add_days(Days::new(1)) {
                Some(next) => next,
                None => break,
            };
            if self.is_business_day(day) {
                count += 1;
            }
        }
        count
    }

    /// The date `n` business days after `from`
    pub fn add_business_days(&self, from: NaiveDate, n: u32) -> NaiveDate {
        let mut remaining = n;
        let mut day = from;
        while remaining > 0 {
            day = match day.checked_add_days(Days::new(1)) {
                Some(next) => next,
                None => return day,
            };
            if self.is_business_day(day) {
                remaining -= 1;
            }
        }
        day
    }

    /// Classify a due date relative to `today`
    pub fn classify(
        &self,
        due: Option<NaiveDate>,
        today: NaiveDate,
        thresholds: UrgencyThresholds,
    ) -> UrgencyLevel {
        let Some(due) = due else {
            return UrgencyLevel::None;
        };

        if due < today {
            return UrgencyLevel::Overdue;
        }
        if due == today {
            return UrgencyLevel::DueToday;
        }

        let days = self.business_days_between(today, due);
        if days <= thresholds.critical_days {
            UrgencyLevel::Critical
        } else if days <= thresholds.warning_days {
            UrgencyLevel::Warning
        } else {
            UrgencyLevel::None
        }
    }
}

/// Everything needed to classify dates for one request
#[derive(Debug, Clone)]
pub struct UrgencyContext {
    pub calendar: BusinessCalendar,
    pub thresholds: UrgencyThresholds,
    pub today: NaiveDate,
}

impl UrgencyContext {
    pub fn classify(&self, due: Option<NaiveDate>) -> UrgencyLevel {
        self.calendar.classify(due, self.today, self.thresholds)
    }
}
