//! Server-Sent Events support

use crate::runtime::RelayEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert a session subscription into an SSE stream.
///
/// The stream ends when the session runtime stops.
pub fn sse_stream(
    init_event: RelayEvent,
    broadcast_rx: tokio::sync::broadcast::Receiver<RelayEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move { Ok(relay_event_to_axum(init_event)) });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(relay_event_to_axum(event))),
        Err(e) => {
            // Snapshots are full state, so the next one for an item repairs the gap
            tracing::debug!(error = %e, "SSE subscriber lagged");
            None
        }
    });

    Sse::new(init.chain(broadcasts)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn relay_event_to_axum(event: RelayEvent) -> Event {
    let (event_type, data) = match event {
        RelayEvent::Init { view } => (
            "init",
            json!({
                "type": "init",
                "session": view
            }),
        ),
        RelayEvent::Item { snapshot } => (
            "item",
            json!({
                "type": "item",
                "item": snapshot
            }),
        ),
        RelayEvent::Turn { turn } => (
            "turn",
            json!({
                "type": "turn",
                "turn": turn
            }),
        ),
        RelayEvent::Disposed => (
            "disposed",
            json!({
                "type": "disposed"
            }),
        ),
    };

    Event::default().event(event_type).data(data.to_string())
}
