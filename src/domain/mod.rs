//! Domain types and DTOs
//!
//! These types define the data structures for bid board entities.

pub mod apm;
pub mod bid_vendors;
pub mod bids;
pub mod equipment;
pub mod lifecycle;
pub mod money;
pub mod notes;
pub mod patch;
pub mod timeline;
pub mod urgency;
pub mod users;
pub mod vendors;
pub mod views;

// Re-export commonly used types
pub use bids::{BidResponse, BidStatus};
pub use urgency::{UrgencyContext, UrgencyLevel};
pub use views::BoardView;
