//! Estimating / APM board views
//!
//! Each bid sits in exactly one view, derived from its placement flags.

use serde::{Deserialize, Serialize};

use super::bids::Bid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum BoardView {
    #[default]
    Active,
    OnHold,
    Archived,
    ApmActive,
    ApmOnHold,
    ApmArchived,
}

impl BoardView {
    pub const ALL: [BoardView; 6] = [
        BoardView::Active,
        BoardView::OnHold,
        BoardView::Archived,
        BoardView::ApmActive,
        BoardView::ApmOnHold,
        BoardView::ApmArchived,
    ];

    pub fn of(bid: &Bid) -> Self {
        match (bid.sent_to_apm, bid.apm_archived, bid.apm_on_hold) {
            (true, true, _) => BoardView::ApmArchived,
            (true, false, true) => BoardView::ApmOnHold,
            (true, false, false) => BoardView::ApmActive,
            (false, ..) if bid.archived => BoardView::Archived,
            (false, ..) if bid.on_hold => BoardView::OnHold,
            (false, ..) => BoardView::Active,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BoardView::Active => "active",
            BoardView::OnHold => "on_hold",
            BoardView::Archived => "archived",
            BoardView::ApmActive => "apm_active",
            BoardView::ApmOnHold => "apm_on_hold",
            BoardView::ApmArchived => "apm_archived",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BoardView::Active => "Estimating",
            BoardView::OnHold => "Estimating - On Hold",
            BoardView::Archived => "Estimating - Archived",
            BoardView::ApmActive => "APM",
            BoardView::ApmOnHold => "APM - On Hold",
            BoardView::ApmArchived => "APM - Archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let key = s.trim().to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|v| v.as_str() == key)
    }

    pub fn is_apm(&self) -> bool {
        matches!(
            self,
            BoardView::ApmActive | BoardView::ApmOnHold | BoardView::ApmArchived
        )
    }

    /// SQL predicate selecting the bids of this view
    pub fn sql_predicate(&self) -> &'static str {
        match self {
            BoardView::Active => "NOT sent_to_apm AND NOT archived AND NOT on_hold",
            BoardView::OnHold => "NOT sent_to_apm AND NOT archived AND on_hold",
            BoardView::Archived => "NOT sent_to_apm AND archived",
            BoardView::ApmActive => "sent_to_apm AND NOT apm_archived AND NOT apm_on_hold",
            BoardView::ApmOnHold => "sent_to_apm AND NOT apm_archived AND apm_on_hold",
            BoardView::ApmArchived => "sent_to_apm AND apm_archived",
        }
    }
}

impl std::fmt::Display for BoardView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Placement change requested on a bid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Hold,
    Resume,
    Archive,
    Unarchive,
    ReturnToEstimating,
    ApmHold,
    ApmResume,
    ApmArchive,
    ApmUnarchive,
}

impl Placement {
    /// APM placements only make sense once the bid was sent to APM
    pub fn requires_apm(&self) -> bool {
        matches!(
            self,
            Placement::ReturnToEstimating
                | Placement::ApmHold
                | Placement::ApmResume
                | Placement::ApmArchive
                | Placement::ApmUnarchive
        )
    }

    /// UPDATE assignments applied for this placement
    pub fn sql_assignments(&self) -> &'static str {
        match self {
            Placement::Hold => "on_hold = TRUE, on_hold_at = NOW()",
            Placement::Resume => "on_hold = FALSE, on_hold_at = NULL",
            Placement::Archive => {
                "archived = TRUE, archived_at = NOW(), on_hold = FALSE, on_hold_at = NULL"
            }
            Placement::Unarchive => "archived = FALSE, archived_at = NULL",
            Placement::ReturnToEstimating => {
                "sent_to_apm = FALSE, sent_to_apm_at = NULL, apm_on_hold = FALSE, \
                 apm_on_hold_at = NULL, apm_archived = FALSE, apm_archived_at = NULL"
            }
            Placement::ApmHold => "apm_on_hold = TRUE, apm_on_hold_at = NOW()",
            Placement::ApmResume => "apm_on_hold = FALSE, apm_on_hold_at = NULL",
            Placement::ApmArchive => {
                "apm_archived = TRUE, apm_archived_at = NOW(), apm_on_hold = FALSE, \
                 apm_on_hold_at = NULL"
            }
            Placement::ApmUnarchive => "apm_archived = FALSE, apm_archived_at = NULL",
        }
    }

    /// Applies the placement to an in-memory bid, mirroring `sql_assignments`
    pub fn apply(&self, bid: &mut Bid, now: chrono::DateTime<chrono::Utc>) {
        match self {
            Placement::Hold => {
                bid.on_hold = true;
                bid.on_hold_at = Some(now);
            }
            Placement::Resume => {
                bid.on_hold = false;
                bid.on_hold_at = None;
            }
            Placement::Archive => {
                bid.archived = true;
                bid.archived_at = Some(now);
                bid.on_hold = false;
                bid.on_hold_at = None;
            }
            Placement::Unarchive => {
                bid.archived = false;
                bid.archived_at = None;
            }
            Placement::ReturnToEstimating => {
                bid.sent_to_apm = false;
                bid.sent_to_apm_at = None;
                bid.apm_on_hold = false;
                bid.apm_on_hold_at = None;
                bid.apm_archived = false;
                bid.apm_archived_at = None;
            }
            Placement::ApmHold => {
                bid.apm_on_hold = true;
                bid.apm_on_hold_at = Some(now);
            }
            Placement::ApmResume => {
                bid.apm_on_hold = false;
                bid.apm_on_hold_at = None;
            }
            Placement::ApmArchive => {
                bid.apm_archived = true;
                bid.apm_archived_at = Some(now);
                bid.apm_on_hold = false;
                bid.apm_on_hold_at = None;
            }
            Placement::ApmUnarchive => {
                bid.apm_archived = false;
                bid.apm_archived_at = None;
            }
        }
    }

    pub fn event_type(&self) -> super::timeline::TimelineEventType {
        use super::timeline::TimelineEventType as T;
        match self {
            Placement::Hold | Placement::ApmHold => T::PutOnHold,
            Placement::Resume | Placement::ApmResume => T::Resumed,
            Placement::Archive | Placement::ApmArchive => T::Archived,
            Placement::Unarchive | Placement::ApmUnarchive => T::Unarchived,
            Placement::ReturnToEstimating => T::ReturnedToEstimating,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Placement::Hold => "Put on hold",
            Placement::Resume => "Resumed from hold",
            Placement::Archive => "Archived",
            Placement::Unarchive => "Restored from archive",
            Placement::ReturnToEstimating => "Returned to estimating",
            Placement::ApmHold => "Put on hold in APM",
            Placement::ApmResume => "Resumed in APM",
            Placement::ApmArchive => "Archived in APM",
            Placement::ApmUnarchive => "Restored from APM archive",
        }
    }
}
