//! Server-sent change feed

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;

use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::services::realtime::{ChangeEvent, ChangeFilter};

/// Turn one hub message into an SSE frame, if the subscriber wants it
fn to_frame(
    filter: &ChangeFilter,
    message: Result<ChangeEvent, BroadcastStreamRecvError>,
) -> Option<Event> {
    match message {
        Ok(event) if filter.accepts(&event) => Event::default()
            .event(event.table.as_str())
            .json_data(&event)
            .ok(),
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped = skipped, "Realtime subscriber lagged");
            Some(
                Event::default()
                    .event("resync")
                    .data(format!("{{\"skipped\":{}}}", skipped)),
            )
        }
    }
}

/// GET /realtime
///
/// Streams board changes, optionally narrowed with `?table=` and `?bid_id=`.
/// Browsers can pass the token as `?access_token=` since EventSource cannot
/// set headers.
pub async fn stream_changes(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ChangeFilter>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(
        user_id = %auth.user_id,
        table = ?filter.table,
        bid_id = ?filter.bid_id,
        "Realtime subscriber connected"
    );

    let stream = BroadcastStream::new(state.hub.subscribe())
        .filter_map(move |message| to_frame(&filter, message).map(Ok::<_, Infallible>));

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
