//! Service layer: board computation, reports, and external integrations.

pub mod board;
pub mod cache;
pub mod email;
pub mod realtime;
pub mod reports;
pub mod timeline;

pub use cache::RedisCache;
pub use email::EmailClient;
pub use realtime::{ChangeEvent, ChangeHub, ChangeOp, Table};
