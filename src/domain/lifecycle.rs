//! Bid lifecycle rules
//!
//! Status changes, hand-off to APM and view placements, applied to an
//! in-memory bid. Route handlers lock the row, run one of these, and write
//! the result back.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::bids::{Bid, BidStatus};
use super::views::Placement;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Only won bids can be sent to APM (status is {})", .0.label())]
    NotWon(BidStatus),

    #[error("Bid has not been sent to APM")]
    NotInApm,

    #[error("Bid is in APM; return it to estimating first")]
    InApm,
}

/// Moves the bid to `status`, stamping the first time it reaches bid sent,
/// won or lost. Returns false when the bid already had that status.
pub fn change_status(bid: &mut Bid, status: BidStatus, now: DateTime<Utc>) -> bool {
    if bid.status == status {
        return false;
    }
    bid.status = status;
    let stamp = match status {
        BidStatus::BidSent => Some(&mut bid.bid_sent_at),
        BidStatus::Won => Some(&mut bid.won_at),
        BidStatus::Lost => Some(&mut bid.lost_at),
        _ => None,
    };
    if let Some(at) = stamp {
        at.get_or_insert(now);
    }
    true
}

/// Hands a won bid to APM. A bid that is already in APM is left alone and
/// reports false, whatever its status is now.
pub fn send_to_apm(
    bid: &mut Bid,
    assignee: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<bool, LifecycleError> {
    if bid.sent_to_apm {
        return Ok(false);
    }
    if bid.status != BidStatus::Won {
        return Err(LifecycleError::NotWon(bid.status));
    }
    bid.sent_to_apm = true;
    bid.sent_to_apm_at = Some(now);
    if assignee.is_some() {
        bid.apm_assigned_to = assignee;
    }
    bid.apm_on_hold = false;
    bid.apm_on_hold_at = None;
    bid.apm_archived = false;
    bid.apm_archived_at = None;
    Ok(true)
}

/// Applies a placement. APM placements need a bid in APM and estimating
/// placements need one outside it. Returns false when the bid stays in the
/// view it was already in.
pub fn place(
    bid: &mut Bid,
    placement: Placement,
    now: DateTime<Utc>,
) -> Result<bool, LifecycleError> {
    let before = bid.view();
    match (placement.requires_apm(), before.is_apm()) {
        (true, false) => return Err(LifecycleError::NotInApm),
        (false, true) => return Err(LifecycleError::InApm),
        _ => {}
    }

    let mut next = bid.clone();
    placement.apply(&mut next, now);
    if next.view() == before {
        return Ok(false);
    }
    *bid = next;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bids::fixtures::bid;
    use crate::domain::BoardView;
    use chrono::Duration;

    fn won() -> Bid {
        let mut b = bid("Hospital Wing");
        change_status(&mut b, BidStatus::Won, Utc::now());
        b
    }

    #[test]
    fn status_changes_stamp_once() {
        let mut b = bid("Retail Fitout");
        let first = Utc::now();

        assert!(change_status(&mut b, BidStatus::BidSent, first));
        assert_eq!(b.bid_sent_at, Some(first));
        assert!(b.won_at.is_none());

        assert!(!change_status(&mut b, BidStatus::BidSent, first + Duration::hours(1)));

        // Bouncing back and forth keeps the original stamp
        assert!(change_status(&mut b, BidStatus::GatheringCosts, first));
        assert!(change_status(&mut b, BidStatus::BidSent, first + Duration::days(2)));
        assert_eq!(b.bid_sent_at, Some(first));

        assert!(change_status(&mut b, BidStatus::Lost, first));
        assert_eq!(b.lost_at, Some(first));
        assert!(b.won_at.is_none());
    }

    #[test]
    fn plain_statuses_leave_stamps_alone() {
        let mut b = bid("Office Tower");
        assert!(change_status(&mut b, BidStatus::GatheringCosts, Utc::now()));
        assert!(b.bid_sent_at.is_none());
        assert!(b.won_at.is_none());
        assert!(b.lost_at.is_none());
    }

    #[test]
    fn only_won_bids_go_to_apm() {
        let mut b = bid("Warehouse");
        b.status = BidStatus::BidSent;
        let err = send_to_apm(&mut b, None, Utc::now()).unwrap_err();
        assert_eq!(err, LifecycleError::NotWon(BidStatus::BidSent));
        assert_eq!(
            err.to_string(),
            "Only won bids can be sent to APM (status is Bid Sent)"
        );
        assert!(!b.sent_to_apm);
    }

    #[test]
    fn sending_to_apm_is_idempotent() {
        let pm = Uuid::new_v4();
        let mut b = won();
        let at = Utc::now();

        assert_eq!(send_to_apm(&mut b, Some(pm), at), Ok(true));
        assert_eq!(b.view(), BoardView::ApmActive);
        assert_eq!(b.sent_to_apm_at, Some(at));
        assert_eq!(b.apm_assigned_to, Some(pm));

        // A repeat keeps the first stamp and assignee, even after the status moved on
        b.status = BidStatus::Lost;
        let before = b.clone();
        assert_eq!(send_to_apm(&mut b, Some(Uuid::new_v4()), at + Duration::days(1)), Ok(false));
        assert_eq!(b.sent_to_apm_at, before.sent_to_apm_at);
        assert_eq!(b.apm_assigned_to, Some(pm));
    }

    #[test]
    fn sending_without_assignee_keeps_the_previous_one() {
        let pm = Uuid::new_v4();
        let mut b = won();
        b.apm_assigned_to = Some(pm);
        b.apm_archived = true;

        assert_eq!(send_to_apm(&mut b, None, Utc::now()), Ok(true));
        assert_eq!(b.apm_assigned_to, Some(pm));
        assert!(!b.apm_archived);
    }

    #[test]
    fn apm_placements_need_a_sent_bid() {
        let mut b = won();
        for placement in [
            Placement::ApmHold,
            Placement::ApmResume,
            Placement::ApmArchive,
            Placement::ApmUnarchive,
            Placement::ReturnToEstimating,
        ] {
            assert_eq!(
                place(&mut b, placement, Utc::now()),
                Err(LifecycleError::NotInApm)
            );
        }
        assert_eq!(b.view(), BoardView::Active);
    }

    #[test]
    fn estimating_placements_refuse_apm_bids() {
        let mut b = won();
        send_to_apm(&mut b, None, Utc::now()).unwrap();
        assert_eq!(
            place(&mut b, Placement::Hold, Utc::now()),
            Err(LifecycleError::InApm)
        );
        assert!(!b.on_hold);
    }

    #[test]
    fn repeated_placement_is_a_no_op() {
        let mut b = bid("School Retrofit");
        let first = Utc::now();

        assert_eq!(place(&mut b, Placement::Hold, first), Ok(true));
        assert_eq!(b.view(), BoardView::OnHold);

        assert_eq!(place(&mut b, Placement::Hold, first + Duration::hours(3)), Ok(false));
        assert_eq!(b.on_hold_at, Some(first));

        assert_eq!(place(&mut b, Placement::Resume, first), Ok(true));
        assert_eq!(place(&mut b, Placement::Resume, first), Ok(false));
        assert_eq!(b.view(), BoardView::Active);
    }

    #[test]
    fn return_to_estimating_leaves_apm() {
        let mut b = won();
        send_to_apm(&mut b, None, Utc::now()).unwrap();
        assert_eq!(place(&mut b, Placement::ApmArchive, Utc::now()), Ok(true));
        assert_eq!(b.view(), BoardView::ApmArchived);

        assert_eq!(place(&mut b, Placement::ReturnToEstimating, Utc::now()), Ok(true));
        assert_eq!(b.view(), BoardView::Active);
        assert!(!b.apm_archived);
    }
}
