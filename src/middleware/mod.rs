pub mod request_id;
pub mod trace;

pub use request_id::{request_id_layer, RequestId};
pub use trace::PathSpan;
